mod errors;
mod shaper;

pub mod handlers;

use crate::service::query::QueryWindow;
use autometrics::autometrics;
use fiberplane::models::providers::{Metric, Timeseries};
use fiberplane::models::timestamps::{TimeRange, Timestamp};
use mondrian_charts::*;
use once_cell::sync::Lazy;
use resvg::tiny_skia::{Color, Pixmap};
use resvg::usvg::{self, TreeParsing, TreeTextToPath};
use std::collections::BTreeMap;
use std::fmt::Write;
use time::OffsetDateTime;
use tracing::{debug, instrument};

pub use errors::{ChartHandlerError, ChartServiceError};
pub use shaper::{ChartInput, Serial};

/// Preferred families for the `sans-serif` font all chart text is set in.
const SANS_SERIF_FAMILIES: &[&str] = &[
    "Inter",
    "DejaVu Sans",
    "Liberation Sans",
    "Noto Sans",
    "Arial",
    "Helvetica",
];

static FONTS: Lazy<fontdb::Database> = Lazy::new(|| {
    let mut fonts = fontdb::Database::new();
    fonts.load_system_fonts();

    let family = SANS_SERIF_FAMILIES.iter().find(|wanted| {
        fonts
            .faces()
            .any(|face| face.families.iter().any(|(family, _)| family == *wanted))
    });
    if let Some(family) = family {
        fonts.set_sans_serif_family(*family);
    }

    fonts
});

const GRID_STROKE_COLOR: &str = "#e7e7e7"; // colorBase300
const TICK_COLOR: &str = "#a4a4a4"; // colorBase500
const TEXT_COLOR: &str = "#3e3e3e"; // colorBase700

// colorSupport*400
const SHAPE_COLORS: &[&str] = &[
    "#c00eae", "#23304a", "#cf3411", "#5f4509", "#1e6378", "#446e02", "#117548", "#943e5c",
    "#661c28", "#802677", "#4f18f4",
];

const TITLE_HEIGHT: u32 = 48;
const TITLE_FONT_SIZE: u32 = 20;
const LEGEND_COLUMN_WIDTH: u32 = 280;
const LEGEND_ROW_HEIGHT: u32 = 28;
const LEGEND_FONT_SIZE: u32 = 16;
const LEGEND_SWATCH_SIZE: u32 = 12;
const PADDING: u32 = 16;

fn get_shape_list_color<S>(_shape: &S, index: usize) -> &str {
    SHAPE_COLORS[index % SHAPE_COLORS.len()]
}

#[derive(clap::Args, Debug)]
pub struct ChartServiceConfig {
    /// Width of rendered charts, in pixels.
    #[clap(
        long,
        env,
        default_value = "1180",
        value_parser = clap::value_parser!(u16).range(200..),
        help_heading = "Charts"
    )]
    chart_width: u16,

    /// Height of the plot area of rendered charts, in pixels. The title and
    /// legend are drawn above and below it.
    #[clap(
        long,
        env,
        default_value = "400",
        value_parser = clap::value_parser!(u16).range(100..),
        help_heading = "Charts"
    )]
    chart_height: u16,
}

#[cfg(test)]
impl ChartServiceConfig {
    pub fn new_test_config() -> Self {
        Self {
            chart_width: 640,
            chart_height: 240,
        }
    }
}

pub struct ChartService {
    config: ChartServiceConfig,
}

impl ChartService {
    pub fn new(config: ChartServiceConfig) -> Self {
        Self { config }
    }

    /// Renders the chart input as a PNG line chart spanning the query window,
    /// titled with the query and with a legend of the series labels.
    ///
    /// Rendering can take a while for large series, so it is moved off the
    /// async workers.
    #[autometrics]
    #[instrument(err, skip_all, fields(title = %chart.title, series = chart.serials.len()))]
    pub async fn render(
        &self,
        chart: ChartInput,
        window: QueryWindow,
    ) -> Result<Vec<u8>, ChartServiceError> {
        let time_range = window
            .time_range()
            .map_err(|err| ChartServiceError::InvalidSample(err.to_string()))?;
        let (width, height) = (self.config.chart_width, self.config.chart_height);

        tokio::task::spawn_blocking(move || create_chart(chart, time_range, width, height))
            .await
            .map_err(|err| ChartServiceError::Render(err.to_string()))?
    }
}

fn create_chart(
    chart: ChartInput,
    time_range: TimeRange,
    width: u16,
    plot_height: u16,
) -> Result<Vec<u8>, ChartServiceError> {
    debug!(title = %chart.title, "Creating chart");

    let ChartInput { title, serials } = chart;
    let labels: Vec<_> = serials.iter().map(|serial| serial.label.clone()).collect();

    let timeseries_data = serials
        .into_iter()
        .map(into_timeseries)
        .collect::<Result<Vec<_>, _>>()?;
    let timeseries_refs: Vec<_> = timeseries_data.iter().collect();

    let chart = line_chart(&timeseries_refs, time_range)?;

    let chart_options = ChartOptions {
        width,
        height: plot_height,
        area_gradient_shown: false,
        axis_lines_shown: true,
        grid_columns_shown: true,
        grid_rows_shown: true,
        grid_stroke_color: GRID_STROKE_COLOR,
        grid_stroke_dasharray: Default::default(),
        shape_stroke_width: Some(2.0),
        get_shape_list_color: &get_shape_list_color,
        tick_color: TICK_COLOR,
        x_formatter: Some(FormatterKind::Time),
        y_formatter: Some(FormatterKind::Exponent),
    };

    let plot = chart_to_svg(&chart, &chart_options);
    let layout = ChartLayout::new(width, plot_height, labels.len());

    rasterize(&compose_svg(&title, &labels, &plot, &layout), &layout)
}

/// Lays the series out as one line each across the time range.
fn line_chart<'source>(
    timeseries_data: &[&'source Timeseries],
    time_range: TimeRange,
) -> Result<MondrianChart<SeriesSource<'source>, PointSource<'source>>, ChartServiceError> {
    generate(CombinedSourceData {
        graph_type: GraphType::Line,
        stacking_type: StackingType::None,
        timeseries_data,
        events: &[],
        target_latency: None,
        time_range,
    })
    .ok_or(ChartServiceError::Generation)
}

/// Dimensions of the final image: a title row, the plot, and as many legend
/// rows as the series need.
#[derive(Debug, PartialEq)]
struct ChartLayout {
    width: u32,
    height: u32,
    plot_height: u32,
    legend_columns: u32,
}

impl ChartLayout {
    fn new(width: u16, plot_height: u16, series: usize) -> Self {
        let width = u32::from(width);
        let plot_height = u32::from(plot_height);
        let legend_columns = (width.saturating_sub(PADDING) / LEGEND_COLUMN_WIDTH).max(1);
        let series = u32::try_from(series).unwrap_or(u32::MAX);
        let legend_rows = (series + legend_columns - 1) / legend_columns;

        Self {
            width,
            height: TITLE_HEIGHT + plot_height + legend_rows * LEGEND_ROW_HEIGHT + PADDING,
            plot_height,
            legend_columns,
        }
    }
}

/// Wraps the plot in an SVG document with the query as title and a legend
/// mapping each series color to its label.
fn compose_svg(title: &str, labels: &[String], plot: &str, layout: &ChartLayout) -> String {
    let ChartLayout {
        width,
        height,
        plot_height,
        legend_columns,
    } = *layout;

    let mut svg = format!(
        "<svg xmlns=\"http://www.w3.org/2000/svg\" version=\"1.1\" width=\"{width}\" height=\"{height}\">\
            <text x=\"{PADDING}\" y=\"{}\" font-family=\"sans-serif\" font-size=\"{TITLE_FONT_SIZE}\" font-weight=\"600\" fill=\"{TEXT_COLOR}\">Expr: {}</text>\
            <g transform=\"translate(0, {TITLE_HEIGHT})\">{plot}</g>",
        TITLE_HEIGHT - PADDING,
        escape_xml(title),
    );

    let legend_top = TITLE_HEIGHT + plot_height + PADDING / 2;
    for (index, label) in (0u32..).zip(labels) {
        let x = PADDING + (index % legend_columns) * LEGEND_COLUMN_WIDTH;
        let y = legend_top + (index / legend_columns) * LEGEND_ROW_HEIGHT;
        let color = SHAPE_COLORS[index as usize % SHAPE_COLORS.len()];

        // Writing to a String cannot fail.
        let _ = write!(
            svg,
            "<rect x=\"{x}\" y=\"{y}\" width=\"{LEGEND_SWATCH_SIZE}\" height=\"{LEGEND_SWATCH_SIZE}\" fill=\"{color}\" />\
            <text x=\"{}\" y=\"{}\" font-family=\"sans-serif\" font-size=\"{LEGEND_FONT_SIZE}\" fill=\"{TEXT_COLOR}\">{}</text>",
            x + LEGEND_SWATCH_SIZE + 8,
            y + LEGEND_SWATCH_SIZE,
            escape_xml(label),
        );
    }

    svg.push_str("</svg>");
    svg
}

fn escape_xml(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}

fn rasterize(svg: &str, layout: &ChartLayout) -> Result<Vec<u8>, ChartServiceError> {
    let mut tree = usvg::Tree::from_data(svg.as_bytes(), &usvg::Options::default())
        .map_err(|err| ChartServiceError::Render(err.to_string()))?;
    tree.convert_text(&FONTS);

    let mut pixels = Pixmap::new(layout.width, layout.height)
        .ok_or_else(|| ChartServiceError::Render("Invalid chart dimensions".to_owned()))?;
    pixels.fill(Color::WHITE);
    resvg::Tree::from_usvg(&tree).render(usvg::Transform::identity(), &mut pixels.as_mut());

    pixels
        .encode_png()
        .map_err(|err| ChartServiceError::Render(err.to_string()))
}

/// Parses the textual samples of a serial into a timeseries.
fn into_timeseries(serial: Serial) -> Result<Timeseries, ChartServiceError> {
    let metrics = serial
        .x
        .iter()
        .zip(&serial.y)
        .map(|(timestamp, value)| {
            let time = OffsetDateTime::from_unix_timestamp_nanos((timestamp * 1e9) as i128)
                .map_err(|err| ChartServiceError::InvalidSample(err.to_string()))?;

            Ok(Metric::builder()
                .time(Timestamp::from(time))
                .value(value.parse::<f64>()?)
                .build())
        })
        .collect::<Result<Vec<_>, ChartServiceError>>()?;

    Ok(Timeseries::builder()
        .name(serial.label)
        .labels(BTreeMap::new())
        .metrics(metrics)
        .visible(true)
        .build())
}
