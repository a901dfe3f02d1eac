//! KML overlay export.
//!
//! Emits one point placemark per record whose position passes the Taiwan
//! lng/lat gate. Sentinel `(0, 0)` records never pass and are skipped
//! without being reported as errors.

use quick_xml::events::{BytesCData, BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use std::io::Cursor;

use crate::config::ExportConfig;
use crate::geo::looks_like_lnglat;
use crate::types::{display_value, NormalizedRecord};

const KML_NAMESPACE: &str = "http://www.opengis.net/kml/2.2";

/// Id of the style shared by every placemark.
pub const STYLE_ID: &str = "site";

/// Placemark name for sites with no name.
const UNNAMED: &str = "未命名";

/// Rendered overlay plus the number of placemarks it holds.
#[derive(Debug)]
pub struct RenderedKml {
    pub bytes: Vec<u8>,
    pub placemarks: usize,
}

/// Whether a record gets a placemark.
pub fn is_placeable(record: &NormalizedRecord) -> bool {
    looks_like_lnglat(record.longitude, record.latitude)
}

/// Rich-text popup body for one site.
pub fn describe(record: &NormalizedRecord) -> String {
    let raw = &record.raw;
    let field = |v: &Option<serde_json::Value>| display_value(v.as_ref());
    format!(
        "<b>縣市：</b> {}<br/>\
         <b>類型：</b> {}<br/>\
         <b>流向編號：</b> {}<br/>\
         <b>申報日期：</b> {}<br/>\
         <hr/>\
         <b>B1~B7 剩餘填埋量：</b> {} ㎥<br/>\
         <b>B1~B7 核准填埋量：</b> {} ㎥<br/>\
         <b>面積：</b> {} 公頃<br/>\
         <hr/>\
         <b>經度：</b> {:?}<br/>\
         <b>緯度：</b> {:?}<br/>\
         <b>座標狀態：</b> {}<br/>",
        field(&raw.city),
        field(&raw.typename),
        field(&raw.control_id),
        field(&raw.applydate),
        field(&raw.remain),
        field(&raw.maxbury),
        field(&raw.area),
        record.longitude,
        record.latitude,
        record.coord_status.label(),
    )
}

fn placemark_name(record: &NormalizedRecord) -> String {
    let name = display_value(record.raw.dumpname.as_ref());
    if name.trim().is_empty() {
        UNNAMED.to_string()
    } else {
        name
    }
}

fn text_element<W: std::io::Write>(writer: &mut Writer<W>, tag: &str, text: &str) -> quick_xml::Result<()> {
    writer.write_event(Event::Start(BytesStart::new(tag)))?;
    writer.write_event(Event::Text(BytesText::new(text)))?;
    writer.write_event(Event::End(BytesEnd::new(tag)))?;
    Ok(())
}

fn write_style<W: std::io::Write>(writer: &mut Writer<W>, icon_href: &str) -> quick_xml::Result<()> {
    writer.write_event(Event::Start(BytesStart::new("Style").with_attributes([("id", STYLE_ID)])))?;
    writer.write_event(Event::Start(BytesStart::new("IconStyle")))?;
    writer.write_event(Event::Start(BytesStart::new("Icon")))?;
    text_element(writer, "href", icon_href)?;
    writer.write_event(Event::End(BytesEnd::new("Icon")))?;
    writer.write_event(Event::End(BytesEnd::new("IconStyle")))?;
    writer.write_event(Event::End(BytesEnd::new("Style")))?;
    Ok(())
}

fn write_placemark<W: std::io::Write>(writer: &mut Writer<W>, record: &NormalizedRecord) -> quick_xml::Result<()> {
    writer.write_event(Event::Start(BytesStart::new("Placemark")))?;
    text_element(writer, "name", &placemark_name(record))?;

    // "]]>" would terminate the CDATA section early
    let description = describe(record).replace("]]>", "]]&gt;");
    writer.write_event(Event::Start(BytesStart::new("description")))?;
    writer.write_event(Event::CData(BytesCData::new(description)))?;
    writer.write_event(Event::End(BytesEnd::new("description")))?;

    text_element(writer, "styleUrl", &format!("#{STYLE_ID}"))?;
    writer.write_event(Event::Start(BytesStart::new("Point")))?;
    text_element(
        writer,
        "coordinates",
        &format!("{},{},0", record.longitude, record.latitude),
    )?;
    writer.write_event(Event::End(BytesEnd::new("Point")))?;
    writer.write_event(Event::End(BytesEnd::new("Placemark")))?;
    Ok(())
}

/// Render the overlay document to memory.
pub fn render_kml(records: &[NormalizedRecord], config: &ExportConfig) -> quick_xml::Result<RenderedKml> {
    let mut writer = Writer::new_with_indent(Cursor::new(Vec::new()), b' ', 2);

    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
    writer.write_event(Event::Start(
        BytesStart::new("kml").with_attributes([("xmlns", KML_NAMESPACE)]),
    ))?;
    writer.write_event(Event::Start(BytesStart::new("Document")))?;
    text_element(&mut writer, "name", &config.document_name)?;
    write_style(&mut writer, &config.icon_href)?;

    let mut placemarks = 0;
    for record in records.iter().filter(|r| is_placeable(r)) {
        write_placemark(&mut writer, record)?;
        placemarks += 1;
    }

    writer.write_event(Event::End(BytesEnd::new("Document")))?;
    writer.write_event(Event::End(BytesEnd::new("kml")))?;

    Ok(RenderedKml {
        bytes: writer.into_inner().into_inner(),
        placemarks,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{CoordStatus, RawRecord};
    use serde_json::json;

    fn record(name: Option<&str>, lng: f64, lat: f64, status: CoordStatus) -> NormalizedRecord {
        NormalizedRecord {
            raw: RawRecord {
                dumpname: name.map(|n| json!(n)),
                city: Some(json!("新北市")),
                remain: Some(json!(1200)),
                ..RawRecord::default()
            },
            longitude: lng,
            latitude: lat,
            coord_status: status,
        }
    }

    fn render(records: &[NormalizedRecord]) -> (String, usize) {
        let rendered = render_kml(records, &ExportConfig::default()).unwrap();
        (String::from_utf8(rendered.bytes).unwrap(), rendered.placemarks)
    }

    #[test]
    fn test_skips_sentinel_positions() {
        let (kml, placemarks) = render(&[
            record(Some("A"), 121.5, 25.0, CoordStatus::AsIs),
            record(Some("B"), 0.0, 0.0, CoordStatus::Anomalous),
            record(Some("C"), 0.0, 0.0, CoordStatus::ConversionError),
            record(Some("D"), 120.3, 22.6, CoordStatus::Projected),
        ]);
        assert_eq!(placemarks, 2);
        assert_eq!(kml.matches("<Placemark>").count(), 2);
        assert!(kml.contains("<name>A</name>"));
        assert!(!kml.contains("<name>B</name>"));
        assert!(kml.contains("<coordinates>120.3,22.6,0</coordinates>"));
    }

    #[test]
    fn test_shared_style_and_namespace() {
        let (kml, _) = render(&[record(Some("A"), 121.5, 25.0, CoordStatus::AsIs)]);
        assert!(kml.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>"));
        assert!(kml.contains("<kml xmlns=\"http://www.opengis.net/kml/2.2\">"));
        assert_eq!(kml.matches("<Style id=\"site\">").count(), 1);
        assert!(kml.contains("placemark_circle.png"));
        assert!(kml.contains("<styleUrl>#site</styleUrl>"));
    }

    #[test]
    fn test_unnamed_site_and_escaping() {
        let (kml, _) = render(&[
            record(None, 121.5, 25.0, CoordStatus::AsIs),
            record(Some("R&D <site>"), 121.5, 25.0, CoordStatus::AsIs),
        ]);
        assert!(kml.contains("<name>未命名</name>"));
        assert!(kml.contains("<name>R&amp;D &lt;site&gt;</name>"));
    }

    #[test]
    fn test_description_block() {
        let text = describe(&record(Some("A"), 121.5, 25.0, CoordStatus::Swapped));
        assert!(text.contains("<b>縣市：</b> 新北市<br/>"));
        assert!(text.contains("<b>B1~B7 剩餘填埋量：</b> 1200 ㎥<br/>"));
        assert!(text.contains("<b>面積：</b>  公頃<br/>"));
        assert!(text.contains("<b>經度：</b> 121.5<br/>"));
        assert!(text.contains("<b>緯度：</b> 25.0<br/>"));
        assert!(text.contains("<b>座標狀態：</b> 已修正(X/Y反轉→經緯度)<br/>"));
    }

    #[test]
    fn test_empty_document_is_well_formed() {
        let (kml, placemarks) = render(&[]);
        assert_eq!(placemarks, 0);
        assert!(kml.contains("<Document>"));
        assert!(kml.trim_end().ends_with("</kml>"));
    }
}
