//! Draws the joined municipalities as a standalone SVG document.
//!
//! The layout follows a square figure: the title on top, the map in the
//! middle, the source note in the bottom left corner and a two entry legend in
//! the top right corner of the map.

use log::debug;

use std::io::{self, Write};

use geo::{BoundingRect, Coord, LineString, MultiPolygon, Rect};

use crate::report::*;

const MARGIN: f64 = 60.0;
const TITLE_BAND: f64 = 110.0;
const FOOTER_BAND: f64 = 140.0;
const TITLE_FONT_SIZE: u32 = 25;
const NOTE_FONT_SIZE: u32 = 10;
const NOTE_COLOR: &str = "#555555";
const EDGE_COLOR: &str = "grey";
const EDGE_WIDTH: f64 = 0.1;

/// A [`MapRenderer`] writing SVG to any output.
pub struct SvgRenderer<W: Write> {
    out: W,
    width: f64,
    height: f64,
}

impl<W: Write> SvgRenderer<W> {
    pub const DEFAULT_SIZE: f64 = 1200.0;

    pub fn new(out: W) -> SvgRenderer<W> {
        SvgRenderer {
            out,
            width: SvgRenderer::<W>::DEFAULT_SIZE,
            height: SvgRenderer::<W>::DEFAULT_SIZE,
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> MapRenderer for SvgRenderer<W> {
    type Error = io::Error;

    fn render(&mut self, rows: &[JoinedMapRow], style: &MapStyle) -> io::Result<()> {
        let doc = render_document(rows, style, self.width, self.height);
        self.out.write_all(doc.as_bytes())?;
        self.out.flush()
    }
}

// Deterministic writer: same rows, same bytes.
struct Svg {
    buf: String,
}

impl Svg {
    fn new() -> Svg {
        Svg {
            buf: String::with_capacity(64 * 1024),
        }
    }
    fn push<S: AsRef<str>>(&mut self, s: S) {
        self.buf.push_str(s.as_ref());
    }
    fn finish(self) -> String {
        self.buf
    }
}

fn esc(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Maps longitude/latitude into the plot area, keeping the aspect ratio and
/// putting the north on top.
#[derive(PartialEq, Debug, Clone, Copy)]
struct Projection {
    min_x: f64,
    max_y: f64,
    scale: f64,
    offset_x: f64,
    offset_y: f64,
}

impl Projection {
    fn fit(bounds: Option<Rect<f64>>, area: Rect<f64>) -> Projection {
        let (aw, ah) = (area.width(), area.height());
        let bounds = match bounds {
            Some(b) => b,
            None => {
                return Projection {
                    min_x: 0.0,
                    max_y: 0.0,
                    scale: 1.0,
                    offset_x: area.min().x,
                    offset_y: area.min().y,
                }
            }
        };
        let (dx, dy) = (bounds.width(), bounds.height());
        let scale = match (dx > 0.0, dy > 0.0) {
            (true, true) => (aw / dx).min(ah / dy),
            (true, false) => aw / dx,
            (false, true) => ah / dy,
            (false, false) => 1.0,
        };
        Projection {
            min_x: bounds.min().x,
            max_y: bounds.max().y,
            scale,
            offset_x: area.min().x + (aw - dx * scale) / 2.0,
            offset_y: area.min().y + (ah - dy * scale) / 2.0,
        }
    }

    fn apply(&self, c: Coord<f64>) -> (f64, f64) {
        (
            self.offset_x + (c.x - self.min_x) * self.scale,
            self.offset_y + (self.max_y - c.y) * self.scale,
        )
    }
}

fn bounds(rows: &[JoinedMapRow]) -> Option<Rect<f64>> {
    rows.iter()
        .filter_map(|r| r.geometry.bounding_rect())
        .reduce(|a, b| {
            Rect::new(
                Coord {
                    x: a.min().x.min(b.min().x),
                    y: a.min().y.min(b.min().y),
                },
                Coord {
                    x: a.max().x.max(b.max().x),
                    y: a.max().y.max(b.max().y),
                },
            )
        })
}

fn ring_path(d: &mut String, ring: &LineString<f64>, proj: &Projection) {
    for (idx, c) in ring.coords().enumerate() {
        let (x, y) = proj.apply(*c);
        let cmd = if idx == 0 { "M" } else { "L" };
        d.push_str(&format!("{}{:.2},{:.2} ", cmd, x, y));
    }
    if !ring.0.is_empty() {
        d.push_str("Z ");
    }
}

fn geometry_path(mp: &MultiPolygon<f64>, proj: &Projection) -> String {
    let mut d = String::new();
    for polygon in mp.iter() {
        ring_path(&mut d, polygon.exterior(), proj);
        for interior in polygon.interiors() {
            ring_path(&mut d, interior, proj);
        }
    }
    d.trim_end().to_string()
}

fn render_document(rows: &[JoinedMapRow], style: &MapStyle, width: f64, height: f64) -> String {
    let mut w = Svg::new();
    w.push("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    w.push(format!(
        "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{w}\" height=\"{h}\" viewBox=\"0 0 {w} {h}\">\n",
        w = width,
        h = height
    ));
    w.push("<rect width=\"100%\" height=\"100%\" fill=\"white\"/>\n");

    w.push(format!(
        "<text x=\"{:.1}\" y=\"{:.1}\" text-anchor=\"middle\" font-family=\"sans-serif\" font-size=\"{}\" font-weight=\"300\">{}</text>\n",
        width / 2.0,
        TITLE_BAND / 2.0,
        TITLE_FONT_SIZE,
        esc(&style.title)
    ));

    let area = Rect::new(
        Coord {
            x: MARGIN,
            y: TITLE_BAND,
        },
        Coord {
            x: width - MARGIN,
            y: height - FOOTER_BAND,
        },
    );
    let proj = Projection::fit(bounds(rows), area);
    debug!("render_document: projection {:?}", proj);

    w.push(format!(
        "<g stroke=\"{}\" stroke-width=\"{}\" fill-rule=\"evenodd\">\n",
        EDGE_COLOR, EDGE_WIDTH
    ));
    for r in rows.iter() {
        let entry = style.entry(r.result.result);
        w.push(format!(
            "<path data-code=\"{}\" fill=\"{}\" d=\"{}\"><title>{} ({})</title></path>\n",
            r.census_code,
            esc(&entry.color),
            geometry_path(&r.geometry, &proj),
            esc(&r.result.municipality_name),
            esc(&r.result.state)
        ));
    }
    w.push("</g>\n");

    write_legend(&mut w, style, width);

    // Anchored at 10% of the width and 8% of the height from the bottom.
    w.push(format!(
        "<text x=\"{:.1}\" y=\"{:.1}\" dominant-baseline=\"hanging\" font-family=\"sans-serif\" font-size=\"{}\" fill=\"{}\">{}</text>\n",
        width * 0.1,
        height * 0.92,
        NOTE_FONT_SIZE,
        NOTE_COLOR,
        esc(&style.source_note)
    ));
    w.push("</svg>\n");
    w.finish()
}

fn write_legend(w: &mut Svg, style: &MapStyle, width: f64) {
    let x = width - MARGIN - 220.0;
    let y = TITLE_BAND;
    w.push(format!(
        "<g class=\"legend\" font-family=\"sans-serif\" font-size=\"14\">\n<rect x=\"{:.1}\" y=\"{:.1}\" width=\"220\" height=\"64\" fill=\"white\" fill-opacity=\"0.8\" stroke=\"lightgrey\"/>\n",
        x, y
    ));
    for (idx, entry) in [&style.flag_false, &style.flag_true].iter().enumerate() {
        let row_y = y + 12.0 + 26.0 * idx as f64;
        w.push(format!(
            "<rect x=\"{:.1}\" y=\"{:.1}\" width=\"28\" height=\"14\" fill=\"{}\"/>\n",
            x + 12.0,
            row_y,
            esc(&entry.color)
        ));
        w.push(format!(
            "<text x=\"{:.1}\" y=\"{:.1}\" dominant-baseline=\"middle\">{}</text>\n",
            x + 52.0,
            row_y + 7.0,
            esc(&entry.label)
        ));
    }
    w.push("</g>\n");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn row(code: u64, x: f64, y: f64, won: bool) -> JoinedMapRow {
        JoinedMapRow {
            census_code: CensusCode::new(code),
            geometry: MultiPolygon::new(vec![Rect::new((x, y), (x + 1.0, y + 1.0)).to_polygon()]),
            properties: BTreeMap::new(),
            result: MunicipalityResult {
                state: "RS".to_string(),
                municipality_code: code as u32,
                municipality_name: format!("MUN {}", code),
                candidate_number: if won { 17 } else { 13 },
                candidate_name: "X".to_string(),
                votes: 1,
                result: won,
            },
            auxiliary: BTreeMap::new(),
        }
    }

    fn render(rows: &[JoinedMapRow], style: &MapStyle) -> String {
        let mut renderer = SvgRenderer::new(Vec::new());
        renderer.render(rows, style).unwrap();
        String::from_utf8(renderer.into_inner()).unwrap()
    }

    #[test]
    fn two_colors() {
        let rows = vec![row(1, -52.0, -30.0, true), row(2, -51.0, -30.0, false)];
        let svg = render(&rows, &MapStyle::default());
        assert_eq!(svg.matches("<path ").count(), 2);
        assert!(svg.contains("data-code=\"1\" fill=\"green\""));
        assert!(svg.contains("data-code=\"2\" fill=\"red\""));
        assert!(svg.contains("Resultado Eleição 2018 / Município / 2 Turno"));
        assert!(svg.contains("Fonte: IBGE, 2014; TSE, 2019; Jornal Estado de SP, 2019"));
        assert!(svg.contains(">Os bandidos</text>"));
        assert!(svg.contains(">Bolsomito</text>"));
        // The legend lists the losing color first.
        assert!(svg.find(">Os bandidos<").unwrap() < svg.find(">Bolsomito<").unwrap());
    }

    #[test]
    fn empty_map() {
        let svg = render(&[], &MapStyle::default());
        assert_eq!(svg.matches("<path ").count(), 0);
        assert!(svg.starts_with("<?xml"));
        assert!(svg.trim_end().ends_with("</svg>"));
    }

    #[test]
    fn text_is_escaped() {
        let style = MapStyle {
            title: "A & B <2018>".to_string(),
            ..MapStyle::default()
        };
        let svg = render(&[], &style);
        assert!(svg.contains("A &amp; B &lt;2018&gt;"));
    }

    #[test]
    fn north_is_up() {
        let area = Rect::new((0.0, 0.0), (100.0, 100.0));
        let proj = Projection::fit(Some(Rect::new((-10.0, -10.0), (10.0, 10.0))), area);
        let (_, y_north) = proj.apply(Coord { x: 0.0, y: 10.0 });
        let (_, y_south) = proj.apply(Coord { x: 0.0, y: -10.0 });
        assert!(y_north < y_south);
        assert_eq!(proj.apply(Coord { x: -10.0, y: 10.0 }), (0.0, 0.0));
        assert_eq!(proj.apply(Coord { x: 10.0, y: -10.0 }), (100.0, 100.0));
    }

    #[test]
    fn aspect_ratio_is_kept() {
        // Twice as wide as tall: the map is centered vertically.
        let area = Rect::new((0.0, 0.0), (100.0, 100.0));
        let proj = Projection::fit(Some(Rect::new((0.0, 0.0), (20.0, 10.0))), area);
        assert_eq!(proj.scale, 5.0);
        assert_eq!(proj.apply(Coord { x: 0.0, y: 10.0 }), (0.0, 25.0));
    }
}
