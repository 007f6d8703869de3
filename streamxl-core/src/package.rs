//! The zip container and the fixed parts of an xlsx package.

use std::io::{Read, Seek, Write};

use zip::write::{ExtendedFileOptions, FileOptions};
use zip::{CompressionMethod, ZipWriter};

use crate::error::Result;
use crate::style::StyleTable;
use crate::xml::push_escaped_text;

/// Compression level for package parts.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum CompressionLevel {
    /// No compression - fastest writes, largest files
    None,
    /// Fast compression (deflate level 1) - good balance
    Fast,
    /// Default compression (deflate level 6) - smaller files, slower
    Default,
    /// Best compression (deflate level 9) - smallest files, slowest
    Best,
}

impl std::default::Default for CompressionLevel {
    fn default() -> Self {
        CompressionLevel::Fast
    }
}

/// Settings for a stream file.
#[derive(Clone, Debug)]
pub struct WriterOptions {
    /// Compression applied to every part.
    pub compression: CompressionLevel,
    /// Name recorded as creator and application in the document properties.
    pub application: String,
}

impl WriterOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the compression level.
    pub fn with_compression(mut self, compression: CompressionLevel) -> Self {
        self.compression = compression;
        self
    }

    /// Set the application name written to `docProps`.
    pub fn with_application(mut self, application: impl Into<String>) -> Self {
        self.application = application.into();
        self
    }
}

impl Default for WriterOptions {
    fn default() -> Self {
        WriterOptions {
            compression: CompressionLevel::default(),
            application: "streamxl".to_string(),
        }
    }
}

const XML_DECLARATION: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
"#;

/// Writes package parts into a zip archive, one part at a time.
pub(crate) struct Package<W: Write + Seek> {
    zip: ZipWriter<W>,
    file_options: FileOptions<'static, ExtendedFileOptions>,
    application: String,
}

impl<W: Write + Seek> Package<W> {
    pub(crate) fn new(writer: W, options: &WriterOptions) -> Self {
        Package {
            zip: ZipWriter::new(writer),
            file_options: file_options(options.compression),
            application: options.application.clone(),
        }
    }

    /// Write one complete part.
    fn write_part(&mut self, path: &str, content: &[u8]) -> Result<()> {
        self.zip.start_file(path, self.file_options.clone())?;
        self.zip.write_all(content)?;
        Ok(())
    }

    /// Write `xl/worksheets/sheet{number}.xml`, copying already rendered rows
    /// from `sheet_data`.
    pub(crate) fn write_worksheet<R: Read>(
        &mut self,
        number: usize,
        dimension: &str,
        sheet_data: &mut R,
    ) -> Result<()> {
        let path = format!("xl/worksheets/sheet{}.xml", number);
        self.zip.start_file(path.as_str(), self.file_options.clone())?;

        self.zip.write_all(XML_DECLARATION.as_bytes())?;
        self.zip.write_all(br#"<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships">
<dimension ref=""#)?;
        self.zip.write_all(dimension.as_bytes())?;
        self.zip.write_all(br#""/>
<sheetViews><sheetView workbookViewId="0"/></sheetViews>
<sheetFormatPr defaultRowHeight="15"/>
<sheetData>"#)?;
        std::io::copy(sheet_data, &mut self.zip)?;
        self.zip.write_all(br#"</sheetData>
<pageMargins left="0.75" right="0.75" top="1" bottom="1" header="0.5" footer="0.5"/>
</worksheet>"#)?;
        Ok(())
    }

    /// Write the style sheet, manifests and workbook parts, then finish the zip.
    pub(crate) fn finish(mut self, sheet_names: &[String], styles: &StyleTable) -> Result<W> {
        let content_types = content_types_xml(sheet_names.len());
        self.write_part("[Content_Types].xml", content_types.as_bytes())?;
        self.write_part("_rels/.rels", ROOT_RELS_XML.as_bytes())?;

        let (core, app) = doc_props_xml(&self.application);
        self.write_part("docProps/core.xml", core.as_bytes())?;
        self.write_part("docProps/app.xml", app.as_bytes())?;

        let workbook = workbook_xml(sheet_names);
        self.write_part("xl/workbook.xml", workbook.as_bytes())?;
        let workbook_rels = workbook_rels_xml(sheet_names.len());
        self.write_part("xl/_rels/workbook.xml.rels", workbook_rels.as_bytes())?;

        self.write_part("xl/styles.xml", styles.to_styles_xml().as_bytes())?;

        let mut writer = self.zip.finish()?;
        writer.flush()?;
        Ok(writer)
    }
}

fn file_options(level: CompressionLevel) -> FileOptions<'static, ExtendedFileOptions> {
    match level {
        CompressionLevel::None => FileOptions::default()
            .large_file(false)
            .compression_method(CompressionMethod::Stored),
        CompressionLevel::Fast => FileOptions::default()
            .large_file(false)
            .compression_method(CompressionMethod::Deflated)
            .compression_level(Some(1)),
        CompressionLevel::Default => FileOptions::default()
            .large_file(false)
            .compression_method(CompressionMethod::Deflated)
            .compression_level(Some(6)),
        CompressionLevel::Best => FileOptions::default()
            .large_file(false)
            .compression_method(CompressionMethod::Deflated)
            .compression_level(Some(9)),
    }
}

const ROOT_RELS_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
<Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/>
<Relationship Id="rId2" Type="http://schemas.openxmlformats.org/package/2006/relationships/metadata/core-properties" Target="docProps/core.xml"/>
<Relationship Id="rId3" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/extended-properties" Target="docProps/app.xml"/>
</Relationships>"#;

fn content_types_xml(sheet_count: usize) -> String {
    let mut content = String::from(r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">
<Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>
<Default Extension="xml" ContentType="application/xml"/>
<Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/>
<Override PartName="/xl/styles.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.styles+xml"/>
<Override PartName="/docProps/core.xml" ContentType="application/vnd.openxmlformats-package.core-properties+xml"/>
<Override PartName="/docProps/app.xml" ContentType="application/vnd.openxmlformats-officedocument.extended-properties+xml"/>
"#);

    for i in 0..sheet_count {
        content.push_str(&format!(
            "<Override PartName=\"/xl/worksheets/sheet{}.xml\" ContentType=\"application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml\"/>\n",
            i + 1
        ));
    }

    content.push_str("</Types>");
    content
}

fn doc_props_xml(application: &str) -> (String, String) {
    let mut name = String::with_capacity(application.len());
    push_escaped_text(&mut name, application);

    let core = format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<cp:coreProperties xmlns:cp="http://schemas.openxmlformats.org/package/2006/metadata/core-properties" xmlns:dc="http://purl.org/dc/elements/1.1/" xmlns:dcterms="http://purl.org/dc/terms/">
<dc:creator>{}</dc:creator>
</cp:coreProperties>"#,
        name
    );
    let app = format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Properties xmlns="http://schemas.openxmlformats.org/officeDocument/2006/extended-properties">
<Application>{}</Application>
</Properties>"#,
        name
    );
    (core, app)
}

fn workbook_xml(sheet_names: &[String]) -> String {
    let mut content = String::from(r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships">
<sheets>
"#);

    for (i, name) in sheet_names.iter().enumerate() {
        content.push_str("<sheet name=\"");
        push_escaped_text(&mut content, name);
        content.push_str(&format!("\" sheetId=\"{}\" r:id=\"rId{}\"/>\n", i + 1, i + 1));
    }

    content.push_str("</sheets>\n</workbook>");
    content
}

fn workbook_rels_xml(sheet_count: usize) -> String {
    let mut content = String::from(r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
"#);

    for i in 0..sheet_count {
        content.push_str(&format!(
            "<Relationship Id=\"rId{}\" Type=\"http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet\" Target=\"worksheets/sheet{}.xml\"/>\n",
            i + 1, i + 1
        ));
    }

    content.push_str(&format!(
        "<Relationship Id=\"rId{}\" Type=\"http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles\" Target=\"styles.xml\"/>\n",
        sheet_count + 1
    ));

    content.push_str("</Relationships>");
    content
}
