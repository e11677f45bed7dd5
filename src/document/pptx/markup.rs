//! PresentationML fragments for shapes added by the layout engines.
use crate::document::TextAlign;
use crate::document::TextBox;
use crate::helpers::xml::XmlFragment;
use crate::table::native::NativeRow;
use crate::table::native::NativeTable;
use crate::table::native::CELL_MARGIN_X_PT;
use crate::table::native::CELL_MARGIN_Y_PT;
use crate::table::style;
use crate::table::style::Rgb;
use crate::transform::points_to_emu;
use crate::transform::Rect;
use quick_xml::events::Event;

const TABLE_URI: &str = "http://schemas.openxmlformats.org/drawingml/2006/table";

/// Font size in hundredths of a point.
fn size_attribute(points: f64) -> String {
    ((points * 100.0).round() as i64).to_string()
}

fn transform(fragment: &mut XmlFragment, tag: &str, bounds: Rect) {
    let (x, y) = (bounds.x.to_string(), bounds.y.to_string());
    let (cx, cy) = (bounds.width.to_string(), bounds.height.to_string());
    fragment
        .open(tag, &[])
        .empty("a:off", &[("x", x.as_str()), ("y", y.as_str())])
        .empty("a:ext", &[("cx", cx.as_str()), ("cy", cy.as_str())])
        .close(tag);
}

fn solid_fill(fragment: &mut XmlFragment, color: Rgb) {
    fragment.open("a:solidFill", &[]).empty("a:srgbClr", &[("val", color.hex().as_str())]).close("a:solidFill");
}

fn rectangle(fragment: &mut XmlFragment) {
    fragment.open("a:prstGeom", &[("prst", "rect")]).empty("a:avLst", &[]).close("a:prstGeom");
}

/// Run properties: size, weight and color in the report typeface.
fn run_properties(fragment: &mut XmlFragment, points: f64, bold: bool, color: Rgb) {
    let size = size_attribute(points);
    let bold = if bold { "1" } else { "0" };
    fragment.open("a:rPr", &[("lang", "en-US"), ("sz", size.as_str()), ("b", bold), ("dirty", "0")]);
    solid_fill(fragment, color);
    fragment.empty("a:latin", &[("typeface", style::TYPEFACE)]).close("a:rPr");
}

fn paragraph(fragment: &mut XmlFragment, text: &str, points: f64, bold: bool, color: Rgb, align: Option<&str>) {
    fragment.open("a:p", &[]);
    if let Some(align) = align {
        fragment.empty("a:pPr", &[("algn", align)]);
    }
    if text.is_empty() {
        fragment.empty("a:endParaRPr", &[("lang", "en-US"), ("sz", size_attribute(points).as_str()), ("dirty", "0")]);
    } else {
        fragment.open("a:r", &[]);
        run_properties(fragment, points, bold, color);
        fragment.leaf("a:t", &[], text).close("a:r");
    }
    fragment.close("a:p");
}

/// A picture stretched over `bounds`.
pub(crate) fn picture(id: u32, name: &str, relationship: &str, bounds: Rect) -> Vec<Event<'static>> {
    let id = id.to_string();
    let mut fragment = XmlFragment::new();
    fragment
        .open("p:pic", &[])
        .open("p:nvPicPr", &[])
        .empty("p:cNvPr", &[("id", id.as_str()), ("name", name)])
        .open("p:cNvPicPr", &[])
        .empty("a:picLocks", &[("noChangeAspect", "1")])
        .close("p:cNvPicPr")
        .empty("p:nvPr", &[])
        .close("p:nvPicPr")
        .open("p:blipFill", &[])
        .empty("a:blip", &[("r:embed", relationship)])
        .open("a:stretch", &[])
        .empty("a:fillRect", &[])
        .close("a:stretch")
        .close("p:blipFill")
        .open("p:spPr", &[]);
    transform(&mut fragment, "a:xfrm", bounds);
    rectangle(&mut fragment);
    fragment.close("p:spPr").close("p:pic");
    fragment.into_events()
}

fn table_cell(fragment: &mut XmlFragment, text: &str, row: &NativeRow) {
    let (margin_x, margin_y) = (points_to_emu(CELL_MARGIN_X_PT).to_string(), points_to_emu(CELL_MARGIN_Y_PT).to_string());
    fragment.open("a:tc", &[]).open("a:txBody", &[]).empty("a:bodyPr", &[]).empty("a:lstStyle", &[]);
    paragraph(fragment, text, row.font_pt, row.bold, style::TEXT, None);
    fragment.close("a:txBody").open(
        "a:tcPr",
        &[("marL", margin_x.as_str()), ("marR", margin_x.as_str()), ("marT", margin_y.as_str()), ("marB", margin_y.as_str()), ("anchor", "ctr")],
    );
    solid_fill(fragment, row.fill);
    fragment.close("a:tcPr").close("a:tc");
}

/// A native table in a graphic frame.
pub(crate) fn table(id: u32, name: &str, table: &NativeTable) -> Vec<Event<'static>> {
    let id = id.to_string();
    let mut fragment = XmlFragment::new();
    fragment
        .open("p:graphicFrame", &[])
        .open("p:nvGraphicFramePr", &[])
        .empty("p:cNvPr", &[("id", id.as_str()), ("name", name)])
        .open("p:cNvGraphicFramePr", &[])
        .empty("a:graphicFrameLocks", &[("noGrp", "1")])
        .close("p:cNvGraphicFramePr")
        .empty("p:nvPr", &[])
        .close("p:nvGraphicFramePr");
    transform(&mut fragment, "p:xfrm", table.bounds);
    fragment
        .open("a:graphic", &[])
        .open("a:graphicData", &[("uri", TABLE_URI)])
        .open("a:tbl", &[])
        .empty("a:tblPr", &[("firstRow", "1"), ("bandRow", "1")])
        .open("a:tblGrid", &[]);
    for width in &table.column_widths {
        fragment.empty("a:gridCol", &[("w", width.to_string().as_str())]);
    }
    fragment.close("a:tblGrid");

    let height = table.row_height.to_string();
    for row in &table.rows {
        fragment.open("a:tr", &[("h", height.as_str())]);
        for column in 0..table.column_widths.len() {
            let text = row.cells.get(column).map(String::as_str).unwrap_or_default();
            table_cell(&mut fragment, text, row);
        }
        fragment.close("a:tr");
    }
    fragment.close("a:tbl").close("a:graphicData").close("a:graphic").close("p:graphicFrame");
    fragment.into_events()
}

/// A text box with one paragraph per entry.
pub(crate) fn text_box(id: u32, text_box: &TextBox) -> Vec<Event<'static>> {
    let id = id.to_string();
    let anchor = if text_box.middle { "ctr" } else { "t" };
    let align = match text_box.align {
        TextAlign::Left => "l",
        TextAlign::Center => "ctr",
    };
    let mut fragment = XmlFragment::new();
    fragment
        .open("p:sp", &[])
        .open("p:nvSpPr", &[])
        .empty("p:cNvPr", &[("id", id.as_str()), ("name", text_box.name.as_str())])
        .empty("p:cNvSpPr", &[("txBox", "1")])
        .empty("p:nvPr", &[])
        .close("p:nvSpPr")
        .open("p:spPr", &[]);
    transform(&mut fragment, "a:xfrm", text_box.bounds);
    rectangle(&mut fragment);
    fragment
        .empty("a:noFill", &[])
        .close("p:spPr")
        .open("p:txBody", &[])
        .open("a:bodyPr", &[("wrap", "square"), ("rtlCol", "0"), ("anchor", anchor)])
        .empty("a:normAutofit", &[])
        .close("a:bodyPr")
        .empty("a:lstStyle", &[]);
    if text_box.paragraphs.is_empty() {
        paragraph(&mut fragment, "", text_box.font_pt, text_box.bold, text_box.color, Some(align));
    }
    for text in &text_box.paragraphs {
        paragraph(&mut fragment, text, text_box.font_pt, text_box.bold, text_box.color, Some(align));
    }
    fragment.close("p:txBody").close("p:sp");
    fragment.into_events()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::helpers::xml::write_events;

    fn xml(events: Vec<Event<'static>>) -> String {
        String::from_utf8(write_events(events.iter()).unwrap()).unwrap()
    }

    #[test]
    fn picture_markup() {
        let markup = xml(picture(5, "chart", "rId3", Rect { x: 1, y: 2, width: 30, height: 40 }));
        assert!(markup.starts_with(r#"<p:pic><p:nvPicPr><p:cNvPr id="5" name="chart"/>"#));
        assert!(markup.contains(r#"<a:blip r:embed="rId3"/>"#));
        assert!(markup.contains(r#"<a:xfrm><a:off x="1" y="2"/><a:ext cx="30" cy="40"/></a:xfrm>"#));
    }

    #[test]
    fn table_markup_pads_short_rows() {
        let table = NativeTable {
            bounds: Rect { x: 0, y: 0, width: 200, height: 20 },
            column_widths: vec![120, 80],
            row_height: 10,
            rows: vec![
                NativeRow { cells: vec!["Host".to_owned(), "Port".to_owned()], fill: style::BLACK, bold: true, font_pt: 9.0 },
                NativeRow { cells: vec!["No data".to_owned()], fill: style::DARK_ROW, bold: false, font_pt: 8.0 },
            ],
        };
        let markup = xml(super::table(9, "ndr_table", &table));
        assert_eq!(markup.matches("<a:tc>").count(), 4);
        assert!(markup.contains(r#"<a:gridCol w="120"/><a:gridCol w="80"/>"#));
        assert!(markup.contains(r#"<a:rPr lang="en-US" sz="900" b="1" dirty="0">"#));
        assert!(markup.contains(r#"<a:endParaRPr lang="en-US" sz="800" dirty="0"/>"#));
        assert!(markup.contains(r#"<a:srgbClr val="0B5394"/>"#));
    }

    #[test]
    fn text_box_markup() {
        let bounds = Rect { x: 0, y: 0, width: 100, height: 50 };
        let markup = xml(text_box(3, &TextBox::no_data("no_data", bounds)));
        assert!(markup.contains(r#"<p:cNvSpPr txBox="1"/>"#));
        assert!(markup.contains(r#"anchor="ctr""#));
        assert!(markup.contains(r#"<a:pPr algn="ctr"/>"#));
        assert!(markup.contains("<a:t>No Data</a:t>"));
    }
}
