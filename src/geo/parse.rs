// src/geo/parse.rs

use encoding_rs::WINDOWS_1252;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

use super::fields::FieldDescriptor;
use crate::error::{LoadError, Result};
use crate::files::SharedDataFile;
use crate::store::{ColumnType, SqlValue};

/// One field of a parsed line, typed per its descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeoField<'a> {
    pub descriptor: &'a FieldDescriptor,
    pub value: SqlValue,
}

/// One line of the geographic header file, fields in descriptor order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeoLocationRecord<'a> {
    pub line_number: usize,
    pub fields: Vec<GeoField<'a>>,
}

impl<'a> GeoLocationRecord<'a> {
    pub fn get(&self, reference_name: &str) -> Option<&SqlValue> {
        self.fields
            .iter()
            .find(|f| f.descriptor.reference_name == reference_name)
            .map(|f| &f.value)
    }

    pub fn into_row(self) -> Vec<SqlValue> {
        self.fields.into_iter().map(|f| f.value).collect()
    }
}

/// Latin-1 bytes of one field, decoded and trimmed.
pub fn decode_field(raw: &[u8]) -> String {
    let (text, _) = WINDOWS_1252.decode_without_bom_handling(raw);
    text.trim().to_string()
}

/// Slice `line` per `fields`. Any field running past the end of the line
/// means the layout and the file disagree, which is an error.
pub fn parse_geo_line<'a>(
    line: &[u8],
    line_number: usize,
    fields: &'a [FieldDescriptor],
) -> std::result::Result<GeoLocationRecord<'a>, String> {
    let mut out = Vec::with_capacity(fields.len());
    for fd in fields {
        if fd.position == 0 {
            return Err(format!("{} has no position", fd.reference_name));
        }
        let range = fd.range();
        if range.end > line.len() {
            return Err(format!(
                "value indices for {} (len: {}, {}:{}) out of range",
                fd.reference_name,
                line.len(),
                range.start,
                range.end
            ));
        }
        let text = decode_field(&line[range]);
        let value = match fd.column_type() {
            ColumnType::Varchar(_) => SqlValue::Text(text),
            ColumnType::Integer => SqlValue::Integer(text.parse().map_err(|_| {
                format!("{} value '{}' is not an integer", fd.reference_name, text)
            })?),
            ColumnType::BigInt => SqlValue::BigInt(text.parse().map_err(|_| {
                format!("{} value '{}' is not an integer", fd.reference_name, text)
            })?),
        };
        out.push(GeoField {
            descriptor: fd,
            value,
        });
    }
    Ok(GeoLocationRecord {
        line_number,
        fields: out,
    })
}

/// Single pass over the geographic file, handing each parsed line to `tx`.
/// Returns the number of records sent.
#[instrument(level = "info", skip_all, fields(file = %file.name()))]
pub async fn stream_geo_locations(
    file: Arc<SharedDataFile>,
    fields: &'static [FieldDescriptor],
    tx: mpsc::Sender<GeoLocationRecord<'static>>,
    cancel: CancellationToken,
) -> Result<usize> {
    let mut scan = file.lock_rewound().await?;
    let mut sent = 0usize;

    while let Some((line_number, line)) = scan.next_line().await? {
        if cancel.is_cancelled() {
            return Err(LoadError::Cancelled);
        }
        if line.is_empty() {
            continue;
        }
        let record = parse_geo_line(line, line_number, fields).map_err(|message| LoadError::Data {
            file: file.name().to_string(),
            line_number,
            line: String::from_utf8_lossy(line).into_owned(),
            message,
        })?;
        if tx.send(record).await.is_err() {
            debug!("geo consumer went away");
            return Err(LoadError::Cancelled);
        }
        sent += 1;
    }

    info!(records = sent, "finished reading geographic file");
    Ok(sent)
}
