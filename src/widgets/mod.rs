pub mod action_bar;
pub mod device_table;
pub mod heart_rate;
pub mod heart_rate_display;
pub mod prompts;
