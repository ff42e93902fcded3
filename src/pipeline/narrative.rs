use std::io::Cursor;

use docx_rs::{
    AbstractNumbering, Docx, IndentLevel, Level, LevelJc, LevelText, NumberFormat, Numbering,
    NumberingId, Paragraph, Pic, Run, SpecialIndentType, Start, Style, StyleType,
};

use crate::error::AppError;

use super::analyze::MarketStats;
use super::format::{grouped, percent_change, usd};
use super::process::MarketRow;

pub const TITLE: &str = "Crypto Market Report";
pub const DISTRIBUTION_HEADING: &str = "24h Change Distribution";

const TITLE_STYLE: &str = "Title";
const HEADING_STYLE: &str = "Heading1";
// ids 0 and 1 belong to the default numbering docx-rs writes
const BULLET_NUMBERING: usize = 2;
// 6in x 3in, matching the chart's 2:1 aspect
const CHART_WIDTH_EMU: u32 = 5_486_400;
const CHART_HEIGHT_EMU: u32 = 2_743_200;

#[derive(Debug, Clone)]
pub struct Narrative {
    pub title: String,
    pub generated: String,
    pub sections: Vec<NarrativeSection>,
}

#[derive(Debug, Clone)]
pub struct NarrativeSection {
    pub heading: String,
    pub paragraphs: Vec<String>,
    /// Paragraphs render as a bulleted list.
    pub bulleted: bool,
    /// The change histogram is placed under the heading, with the paragraphs
    /// as its caption.
    pub chart: bool,
}

impl NarrativeSection {
    fn new(heading: impl Into<String>, paragraphs: Vec<String>) -> Self {
        Self {
            heading: heading.into(),
            paragraphs,
            bulleted: false,
            chart: false,
        }
    }

    fn bulleted(mut self) -> Self {
        self.bulleted = true;
        self
    }

    fn with_chart(mut self) -> Self {
        self.chart = true;
        self
    }
}

impl Narrative {
    /// The document as plain text, one paragraph per line.
    pub fn plain_text(&self) -> String {
        let mut out = format!("{}\n{}\n", self.title, self.generated);
        for section in &self.sections {
            out.push('\n');
            out.push_str(&section.heading);
            out.push('\n');
            for p in &section.paragraphs {
                if section.bulleted {
                    out.push_str("- ");
                }
                out.push_str(p);
                out.push('\n');
            }
        }
        out
    }
}

#[tracing::instrument(
    name = "pipeline_stage narrative",
    skip(rows, stats),
    fields(pipeline.stage = "narrative", narrative.sections)
)]
pub fn compose(rows: &[MarketRow], stats: &MarketStats) -> Narrative {
    let mut sections = vec![
        NarrativeSection::new(
            "Market Overview",
            vec![
                format!("Total Market Cap: {}", usd(stats.overview.total_market_cap)),
                format!("24h Volume: {}", usd(stats.overview.total_volume_24h)),
            ],
        ),
        NarrativeSection::new(
            format!(
                "Top {} Cryptocurrencies by Market Cap",
                stats.top_by_market_cap.len()
            ),
            stats
                .top_by_market_cap
                .iter()
                .map(|c| {
                    format!(
                        "{} ({}): Market Cap {}, Price {}",
                        c.name,
                        c.symbol,
                        usd(c.market_cap),
                        usd(c.price)
                    )
                })
                .collect(),
        )
        .bulleted(),
        NarrativeSection::new(
            "Price Statistics",
            vec![
                format!("Average Price: {}", usd(stats.prices.average)),
                format!("Median Price: {}", usd(stats.prices.median)),
                format!("Highest Price: {}", usd(stats.prices.highest)),
                format!("Lowest Price: {}", usd(stats.prices.lowest)),
            ],
        ),
        NarrativeSection::new(
            "24-Hour Price Changes",
            vec![
                format!(
                    "Highest Gainer: {} ({}) with {}",
                    stats.changes.highest.name,
                    stats.changes.highest.symbol,
                    percent_change(stats.changes.highest.change_24h)
                ),
                format!(
                    "Biggest Decliner: {} ({}) with {}",
                    stats.changes.lowest.name,
                    stats.changes.lowest.symbol,
                    percent_change(stats.changes.lowest.change_24h)
                ),
                format!(
                    "Average 24h Change: {}",
                    percent_change(stats.changes.average)
                ),
            ],
        ),
        NarrativeSection::new(
            "Market Health",
            vec![
                format!("Coins Up: {}", stats.health.positive_performers),
                format!("Coins Down: {}", stats.health.negative_performers),
            ],
        ),
        NarrativeSection::new(
            DISTRIBUTION_HEADING,
            std::iter::once("24h Price Changes: number of coins per change (%) range".to_string())
                .chain(
                    stats
                        .change_distribution
                        .iter()
                        .filter(|b| b.count > 0)
                        .map(|b| {
                            format!(
                                "{} to {}: {} coin{}",
                                percent_change(b.lower),
                                percent_change(b.upper),
                                b.count,
                                if b.count == 1 { "" } else { "s" }
                            )
                        }),
                )
                .collect(),
        )
        .with_chart(),
    ];

    sections.extend(rows.iter().enumerate().map(|(rank, r)| {
        NarrativeSection::new(
            format!("Asset: {} ({})", r.name, r.symbol),
            vec![format!(
                "Ranked #{} by 24h quote volume, {} trades at {} ({} over 24h, \
                 average {}) with {} units exchanged.",
                rank + 1,
                r.symbol,
                usd(r.price),
                percent_change(r.change_24h),
                usd(r.avg_price),
                grouped(r.volume_24h, 2),
            )],
        )
    }));

    tracing::Span::current().record("narrative.sections", sections.len());

    Narrative {
        title: TITLE.to_string(),
        generated: format!(
            "Generated: {}",
            stats.generated_at.format("%Y-%m-%d %H:%M UTC")
        ),
        sections,
    }
}

fn styles(docx: Docx) -> Docx {
    docx.add_style(
        Style::new(TITLE_STYLE, StyleType::Paragraph)
            .name("Title")
            .size(52)
            .bold(),
    )
    .add_style(
        Style::new(HEADING_STYLE, StyleType::Paragraph)
            .name("heading 1")
            .size(32)
            .bold()
            .color("366092"),
    )
    .add_abstract_numbering(
        AbstractNumbering::new(BULLET_NUMBERING).add_level(
            Level::new(
                0,
                Start::new(1),
                NumberFormat::new("bullet"),
                LevelText::new("\u{2022}"),
                LevelJc::new("left"),
            )
            .indent(Some(720), Some(SpecialIndentType::Hanging(360)), None, None),
        ),
    )
    .add_numbering(Numbering::new(BULLET_NUMBERING, BULLET_NUMBERING))
}

fn text(value: &str) -> Paragraph {
    Paragraph::new().add_run(Run::new().add_text(value))
}

/// Encodes the narrative as a `.docx` document, embedding `chart_png` in the
/// section that asks for it.
pub fn render(narrative: &Narrative, chart_png: &[u8]) -> Result<Vec<u8>, AppError> {
    let mut docx = styles(Docx::new())
        .add_paragraph(text(&narrative.title).style(TITLE_STYLE))
        .add_paragraph(text(&narrative.generated));

    for section in &narrative.sections {
        docx = docx.add_paragraph(text(&section.heading).style(HEADING_STYLE));

        if section.chart {
            let pic = Pic::new(chart_png).size(CHART_WIDTH_EMU, CHART_HEIGHT_EMU);
            docx = docx.add_paragraph(Paragraph::new().add_run(Run::new().add_image(pic)));
        }

        for p in &section.paragraphs {
            let paragraph = if section.bulleted {
                text(p).numbering(NumberingId::new(BULLET_NUMBERING), IndentLevel::new(0))
            } else {
                text(p)
            };
            docx = docx.add_paragraph(paragraph);
        }
    }

    let mut buf = Cursor::new(Vec::new());
    docx.build()
        .pack(&mut buf)
        .map_err(|e| AppError::Render(format!("report document: {e}")))?;

    Ok(buf.into_inner())
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::pipeline::analyze::analyze;
    use crate::pipeline::chart::change_histogram;
    use crate::pipeline::process::process;
    use crate::pipeline::process::tests::{record, snapshot};

    fn narrative_for(records: Vec<crate::market::MarketRecord>) -> (usize, Narrative) {
        let count = records.len();
        let rows = process(&snapshot(records));
        let stats = analyze(&rows, Utc::now()).unwrap();
        (count, compose(&rows, &stats))
    }

    #[test]
    fn test_section_count_covers_every_record() {
        let (count, narrative) = narrative_for(vec![
            record("BTC", 50000.0, 10.0, 2.0),
            record("ETH", 3000.0, 10.0, -1.0),
            record("SOL", 150.0, 10.0, 3.0),
        ]);
        assert!(narrative.sections.len() >= count);
        assert_eq!(narrative.sections[0].heading, "Market Overview");
        assert_eq!(narrative.sections.len(), 6 + count);
    }

    #[test]
    fn test_mentions_every_symbol() {
        let (_, narrative) = narrative_for(vec![
            record("BTC", 50000.0, 10.0, 2.0),
            record("ETH", 3000.0, 10.0, -1.0),
        ]);
        let text = narrative.plain_text();
        assert!(text.starts_with(TITLE));
        assert!(text.contains("(BTC)"));
        assert!(text.contains("(ETH)"));
        assert!(text.contains("Highest Gainer: BTC coin (BTC) with +2.00%"));
        assert!(text.contains("Biggest Decliner: ETH coin (ETH) with -1.00%"));
    }

    #[test]
    fn test_top_section_heading_tracks_coin_count() {
        let (_, narrative) = narrative_for(vec![record("BTC", 50000.0, 10.0, 2.0)]);
        assert_eq!(
            narrative.sections[1].heading,
            "Top 1 Cryptocurrencies by Market Cap"
        );
    }

    #[test]
    fn test_top_coins_are_a_list_and_distribution_carries_chart() {
        let (_, narrative) = narrative_for(vec![
            record("BTC", 50000.0, 10.0, 2.0),
            record("ETH", 3000.0, 10.0, -1.0),
        ]);

        let top = &narrative.sections[1];
        assert!(top.bulleted);
        assert!(top.paragraphs[0].starts_with("BTC coin (BTC): Market Cap"));

        let charted: Vec<&str> = narrative
            .sections
            .iter()
            .filter(|s| s.chart)
            .map(|s| s.heading.as_str())
            .collect();
        assert_eq!(charted, vec![DISTRIBUTION_HEADING]);
        assert!(narrative.plain_text().contains("- BTC coin (BTC)"));
    }

    #[test]
    fn test_render_embeds_chart_in_docx() {
        let rows = process(&snapshot(vec![
            record("BTC", 50000.0, 10.0, 2.0),
            record("ETH", 3000.0, 10.0, -1.0),
        ]));
        let stats = analyze(&rows, Utc::now()).unwrap();
        let narrative = compose(&rows, &stats);
        let chart = change_histogram(&stats.change_distribution).unwrap();

        let bytes = render(&narrative, &chart).unwrap();
        assert_eq!(&bytes[..2], b"PK");
        // zip entry names are stored uncompressed
        assert!(bytes.windows(11).any(|w| w == b"word/media/"));
    }
}
