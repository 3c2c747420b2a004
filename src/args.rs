use argh::FromArgs;
use std::path::PathBuf;

#[derive(FromArgs, Debug, Default)]
/// Terminal heart rate monitor for BLE chest straps and watches
pub struct TopLevelCmd {
    /// specify config file path, creates file if it doesn't exist
    #[argh(option, short = 'c')]
    pub config_override: Option<PathBuf>,
    /// config file must exist, including "config_override" files
    #[argh(switch, short = 'r')]
    pub config_required: bool,
    /// use config file as-is (don't save over it)
    #[argh(switch, short = 'n')]
    pub no_save: bool,
    /// no TUI, log heart rate (and insights) to stdout
    #[argh(switch)]
    pub headless: bool,
    #[argh(subcommand)]
    pub subcommands: Option<SubCommands>,
}

#[derive(FromArgs, Debug)]
#[argh(subcommand)]
pub enum SubCommands {
    Ble(BleCmd),
    Dummy(DummyCmd),
}

/// connect to a BLE device with the Heart Rate Measurement characteristic
#[derive(FromArgs, Debug)]
#[argh(subcommand, name = "ble")]
pub struct BleCmd {}

/// generate fake heart rate data instead of using Bluetooth
#[derive(FromArgs, Debug)]
#[argh(subcommand, name = "dummy")]
pub struct DummyCmd {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_flags_and_subcommand() {
        let cmd = TopLevelCmd::from_args(
            &["heartbeat-monitor"],
            &["-c", "custom.toml", "--headless", "-n", "dummy"],
        )
        .unwrap();
        assert_eq!(cmd.config_override, Some(PathBuf::from("custom.toml")));
        assert!(cmd.headless);
        assert!(cmd.no_save);
        assert!(!cmd.config_required);
        assert!(matches!(cmd.subcommands, Some(SubCommands::Dummy(_))));
    }

    #[test]
    fn defaults() {
        let cmd = TopLevelCmd::from_args(&["heartbeat-monitor"], &[]).unwrap();
        assert!(cmd.config_override.is_none());
        assert!(!cmd.headless);
        assert!(cmd.subcommands.is_none());
    }
}
