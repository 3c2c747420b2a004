use ratatui::{
    layout::Rect,
    style::{Color, Style, Stylize},
    symbols,
    widgets::{Axis, Block, Chart, Dataset, GraphType},
    Frame,
};

use crate::app::App;

/// Blank space above and below the plotted BPM range
pub const CHART_BPM_VERT_MARGIN: f64 = 3.0;

pub fn render_bpm_chart(f: &mut Frame, area: Rect, app: &App) {
    let dataset = app.window.bpm_dataset();
    let (low, high) = app.window.bpm_bounds().unwrap_or((0, 0));
    let average = app
        .window
        .snapshot()
        .iter()
        .map(|s| s.bpm() as f64)
        .sum::<f64>()
        / app.window.len().max(1) as f64;

    let datasets = vec![Dataset::default()
        .name("BPM")
        .graph_type(GraphType::Line)
        .marker(symbols::Marker::Braille)
        .style(Style::default().fg(Color::Red))
        .data(&dataset)];

    let labels = if app.settings.misc.chart_show_labels {
        vec![
            format!("{low}").bold(),
            format!("{average:.0}").bold(),
            format!("{high}").bold(),
        ]
    } else {
        vec![]
    };

    let chart = Chart::new(datasets)
        .block(Block::bordered().title("Last 60 readings".cyan().bold()))
        .x_axis(
            Axis::default()
                .style(Style::default().fg(Color::Gray))
                .bounds([0.0, app.window.capacity().saturating_sub(1) as f64]),
        )
        .y_axis(
            Axis::default()
                .style(Style::default().fg(Color::Gray))
                .labels(labels)
                .bounds([
                    (low as f64 - CHART_BPM_VERT_MARGIN).max(0.0),
                    high as f64 + CHART_BPM_VERT_MARGIN,
                ]),
        );
    f.render_widget(chart, area);
}
