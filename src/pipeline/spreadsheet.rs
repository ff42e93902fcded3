use rust_xlsxwriter::{Color, Format, Workbook, Worksheet};

use crate::error::AppError;

use super::analyze::MarketStats;
use super::format::usd;
use super::process::{COLUMNS, MarketRow};

pub const MARKET_SHEET: &str = "Market Data";
pub const ANALYSIS_SHEET: &str = "Analysis";

const HEADER_FILL: u32 = 0x366092;

#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Text(String),
    Number(f64),
    Empty,
}

impl From<&str> for Cell {
    fn from(s: &str) -> Self {
        Cell::Text(s.to_string())
    }
}

impl From<String> for Cell {
    fn from(s: String) -> Self {
        Cell::Text(s)
    }
}

impl From<f64> for Cell {
    fn from(v: f64) -> Self {
        Cell::Number(v)
    }
}

impl From<usize> for Cell {
    fn from(v: usize) -> Self {
        Cell::Number(v as f64)
    }
}

/// A worksheet before it is encoded. The first row is rendered as a styled
/// header.
#[derive(Debug, Clone)]
pub struct Sheet {
    pub name: &'static str,
    pub rows: Vec<Vec<Cell>>,
}

impl Sheet {
    /// Rows below the header line.
    pub fn data_rows(&self) -> &[Vec<Cell>] {
        self.rows.get(1..).unwrap_or(&[])
    }
}

pub fn market_sheet(rows: &[MarketRow]) -> Sheet {
    let mut out = Vec::with_capacity(rows.len() + 1);
    out.push(COLUMNS.iter().map(|c| Cell::from(*c)).collect());

    for r in rows {
        out.push(vec![
            Cell::from(r.name.as_str()),
            Cell::from(r.symbol.as_str()),
            Cell::from(r.price),
            Cell::from(r.market_cap),
            Cell::from(r.volume_24h),
            Cell::from(r.change_24h),
            Cell::from(r.avg_price),
        ]);
    }

    Sheet {
        name: MARKET_SHEET,
        rows: out,
    }
}

pub fn analysis_sheet(stats: &MarketStats) -> Sheet {
    let pair = |label: &str, value: Cell| vec![Cell::from(label), value];

    Sheet {
        name: ANALYSIS_SHEET,
        rows: vec![
            pair(
                "Last Updated",
                Cell::from(stats.generated_at.format("%Y-%m-%d %H:%M").to_string()),
            ),
            pair("Market Overview", Cell::Empty),
            pair(
                "Total Market Cap",
                Cell::from(usd(stats.overview.total_market_cap)),
            ),
            pair("24h Volume", Cell::from(usd(stats.overview.total_volume_24h))),
            pair("Average Price", Cell::from(usd(stats.overview.avg_price))),
            vec![Cell::Empty, Cell::Empty],
            pair("Market Health", Cell::Empty),
            pair("Coins Up", Cell::from(stats.health.positive_performers)),
            pair("Coins Down", Cell::from(stats.health.negative_performers)),
        ],
    }
}

/// Encodes the market and analysis sheets into `.xlsx` bytes.
#[tracing::instrument(
    name = "pipeline_stage spreadsheet",
    skip(rows, stats),
    fields(pipeline.stage = "spreadsheet", rows = rows.len(), bytes)
)]
pub fn render(rows: &[MarketRow], stats: &MarketStats) -> Result<Vec<u8>, AppError> {
    let sheets = [market_sheet(rows), analysis_sheet(stats)];
    let bytes = encode(&sheets)?;
    tracing::Span::current().record("bytes", bytes.len());
    Ok(bytes)
}

pub fn encode(sheets: &[Sheet]) -> Result<Vec<u8>, AppError> {
    let header = Format::new()
        .set_bold()
        .set_font_color(Color::White)
        .set_background_color(Color::RGB(HEADER_FILL));

    let mut workbook = Workbook::new();
    for sheet in sheets {
        let worksheet = workbook.add_worksheet();
        write_sheet(worksheet, sheet, &header)?;
    }

    Ok(workbook.save_to_buffer()?)
}

fn write_sheet(worksheet: &mut Worksheet, sheet: &Sheet, header: &Format) -> Result<(), AppError> {
    worksheet.set_name(sheet.name)?;

    for (r, cells) in sheet.rows.iter().enumerate() {
        let row = r as u32;
        for (c, cell) in cells.iter().enumerate() {
            let col = c as u16;
            match (cell, r == 0) {
                (Cell::Text(s), true) => {
                    worksheet.write_string_with_format(row, col, s.as_str(), header)?;
                }
                (Cell::Number(n), true) => {
                    worksheet.write_number_with_format(row, col, *n, header)?;
                }
                (Cell::Empty, true) => {
                    worksheet.write_blank(row, col, header)?;
                }
                (Cell::Text(s), false) => {
                    worksheet.write_string(row, col, s.as_str())?;
                }
                (Cell::Number(n), false) => {
                    worksheet.write_number(row, col, *n)?;
                }
                (Cell::Empty, false) => {}
            }
        }
    }

    worksheet.autofit();
    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;
    use crate::pipeline::analyze::analyze;
    use crate::pipeline::process::process;
    use crate::pipeline::process::tests::{record, snapshot};

    fn fixture() -> (Vec<MarketRow>, MarketStats) {
        let rows = process(&snapshot(vec![
            record("BTC", 50000.0, 10.0, 2.0),
            record("ETH", 3000.0, 10.0, -1.0),
        ]));
        let at = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let stats = analyze(&rows, at).unwrap();
        (rows, stats)
    }

    #[test]
    fn test_market_sheet_has_header_and_one_row_per_coin() {
        let (rows, _) = fixture();
        let sheet = market_sheet(&rows);

        assert_eq!(sheet.rows[0].len(), COLUMNS.len());
        assert_eq!(sheet.rows[0][0], Cell::from("Name"));
        assert_eq!(sheet.data_rows().len(), rows.len());
        assert_eq!(sheet.data_rows()[0][1], Cell::from("BTC"));
        assert_eq!(sheet.data_rows()[0][2], Cell::Number(50000.0));
        assert_eq!(sheet.data_rows()[1][1], Cell::from("ETH"));
        assert_eq!(sheet.data_rows()[1][2], Cell::Number(3000.0));
    }

    #[test]
    fn test_analysis_sheet_layout() {
        let (_, stats) = fixture();
        let sheet = analysis_sheet(&stats);

        assert_eq!(sheet.rows.len(), 9);
        assert_eq!(
            sheet.rows[0],
            vec![Cell::from("Last Updated"), Cell::from("2024-03-01 12:00")]
        );
        assert_eq!(
            sheet.rows[2],
            vec![Cell::from("Total Market Cap"), Cell::from("$530,000.00")]
        );
        assert_eq!(sheet.rows[7], vec![Cell::from("Coins Up"), Cell::Number(1.0)]);
        assert_eq!(sheet.rows[8], vec![Cell::from("Coins Down"), Cell::Number(1.0)]);
    }

    #[test]
    fn test_render_produces_xlsx_zip() {
        let (rows, stats) = fixture();
        let bytes = render(&rows, &stats).unwrap();
        // xlsx is a zip container
        assert_eq!(&bytes[..2], b"PK");
    }

    #[test]
    fn test_empty_sheet_has_no_data_rows() {
        let sheet = Sheet {
            name: MARKET_SHEET,
            rows: vec![],
        };
        assert!(sheet.data_rows().is_empty());
    }
}
