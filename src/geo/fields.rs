// src/geo/fields.rs

//! Fixed-position layout of the SF1 2010 geographic header file.

use crate::error::{LoadError, Result};
use crate::store::{ColumnDef, ColumnType, TableSchema};

pub const GEO_TABLE: &str = "geo_locations";

/// One fixed-width field of a geographic header line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldDescriptor {
    pub label: &'static str,
    pub reference_name: &'static str,
    pub width: usize,
    /// 1-based column of the field's first character.
    pub position: usize,
    pub numeric: bool,
}

impl FieldDescriptor {
    /// Byte range of the field within a line.
    pub fn range(&self) -> std::ops::Range<usize> {
        let start = self.position - 1;
        start..start + self.width
    }

    /// Lower-cased reference name, as used for the table column.
    pub fn column_name(&self) -> String {
        self.reference_name.to_lowercase()
    }

    /// Nine digits always fit an `integer`; wider numeric fields (the two
    /// area measurements) need `bigint`.
    pub fn column_type(&self) -> ColumnType {
        match (self.numeric, self.width) {
            (true, w) if w > 9 => ColumnType::BigInt,
            (true, _) => ColumnType::Integer,
            (false, w) => ColumnType::Varchar(w),
        }
    }
}

pub const fn text(
    label: &'static str,
    reference_name: &'static str,
    width: usize,
    position: usize,
) -> FieldDescriptor {
    FieldDescriptor {
        label,
        reference_name,
        width,
        position,
        numeric: false,
    }
}

pub const fn numeric(
    label: &'static str,
    reference_name: &'static str,
    width: usize,
    position: usize,
) -> FieldDescriptor {
    FieldDescriptor {
        label,
        reference_name,
        width,
        position,
        numeric: true,
    }
}

pub static GEO_FIELDS: &[FieldDescriptor] = &[
    text("File Identification", "FILEID", 6, 1),
    text("State/U.S. Abbreviation", "STUSAB", 2, 7),
    text("Summary Level", "SUMLEV", 3, 9),
    text("Geographic Component", "GEOCOMP", 2, 12),
    text("Characteristic Iteration", "CHARITER", 3, 14),
    text("Characteristic Iteration File Sequence Number", "CIFSN", 2, 17),
    text("Logical Record Number", "LOGRECNO", 7, 19),
    text("Region", "REGION", 1, 26),
    text("Division", "DIVISION", 1, 27),
    text("State", "STATE", 2, 28),
    text("County", "COUNTY", 3, 30),
    text("County Class Code", "COUNTYCC", 2, 33),
    text("County Size Code", "COUNTYSC", 2, 35),
    text("County Subdivision", "COUSUB", 5, 37),
    text("County Subdivision Class Code", "COUSUBCC", 2, 42),
    text("County Subdivision Size Code", "COUSUBSC", 2, 44),
    text("Place", "PLACE", 5, 46),
    text("Place Class Code", "PLACECC", 2, 51),
    text("Place Size Code", "PLACESC", 2, 53),
    text("Census Tract", "TRACT", 6, 55),
    text("Block Group", "BLKGRP", 1, 61),
    text("Block", "BLOCK", 4, 62),
    text("Internal Use Code", "IUC", 2, 66),
    text("Consolidated City", "CONCIT", 5, 68),
    text("Consolidated City Class Code", "CONCITCC", 2, 73),
    text("Consolidated City Size Code", "CONCITSC", 2, 75),
    text("American Indian Area/Alaska Native Area/Hawaiian Home Land (Census)", "AIANHH", 4, 77),
    text("American Indian Area/Alaska Native Area/Hawaiian Home Land", "AIANHHFP", 5, 81),
    text("American Indian Area/Alaska Native Area/Hawaiian Home Land Class Code", "AIANHHCC", 2, 86),
    text("American Indian Trust Land/Hawaiian Home Land Indicator", "AIHHTLI", 1, 88),
    text("American Indian Tribal Subdivision (Census)", "AITSCE", 3, 89),
    text("American Indian Tribal Subdivision", "AITS", 5, 92),
    text("American Indian Tribal Subdivision Class Code", "AITSCC", 2, 97),
    text("Tribal Census Tract", "TTRACT", 6, 99),
    text("Tribal Block Group", "TBLKGRP", 1, 105),
    text("Alaska Native Regional Corporation", "ANRC", 5, 106),
    text("Alaska Native Regional Corporation Class Code", "ANRCCC", 2, 111),
    text("Metropolitan Statistical Area/Micropolitan Statistical Area", "CBSA", 5, 113),
    text("Metropolitan Statistical Area/Micropolitan Statistical Area Size Code", "CBSASC", 2, 118),
    text("Metropolitan Division", "METDIV", 5, 120),
    text("Combined Statistical Area", "CSA", 3, 125),
    text("New England City and Town Area", "NECTA", 5, 128),
    text("New England City and Town Area Size Code", "NECTASC", 2, 133),
    text("New England City and Town Area Division", "NECTADIV", 5, 135),
    text("Combined New England City and Town Area", "CNECTA", 3, 140),
    text("Metropolitan Statistical Area/Micropolitan Statistical Area Principal City Indicator", "CBSAPCI", 1, 143),
    text("New England City and Town Area Principal City Indicator", "NECTAPCI", 1, 144),
    text("Urban Area", "UA", 5, 145),
    text("Urban Area Size Code", "UASC", 2, 150),
    text("Urban Area Type", "UATYPE", 1, 152),
    text("Urban/Rural", "UR", 1, 153),
    text("Congressional District (111th)", "CD", 2, 154),
    text("State Legislative District (Upper Chamber) (Year 1)", "SLDU", 3, 156),
    text("State Legislative District (Lower Chamber) (Year 1)", "SLDL", 3, 159),
    text("Voting District", "VTD", 6, 162),
    text("Voting District Indicator", "VTDI", 1, 168),
    text("Reserved", "RESERVE2", 3, 169),
    text("ZIP Code Tabulation Area (5-digit)", "ZCTA5", 5, 172),
    text("Subminor Civil Division", "SUBMCD", 5, 177),
    text("Subminor Civil Division Class Code", "SUBMCDCC", 2, 182),
    text("School District (Elementary)", "SDELM", 5, 184),
    text("School District (Secondary)", "SDSEC", 5, 189),
    text("School District (Unified)", "SDUNI", 5, 194),
    numeric("Area (Land)", "AREALAND", 14, 199),
    numeric("Area (Water)", "AREAWATR", 14, 213),
    text("Area Name-Legal/Statistical Area Description", "NAME", 90, 227),
    text("Functional Status Code", "FUNCSTAT", 1, 317),
    text("Geographic Change User Note Indicator", "GCUNI", 1, 318),
    numeric("Population Count (100%)", "POP100", 9, 319),
    numeric("Housing Unit Count (100%)", "HU100", 9, 328),
    text("Internal Point (Latitude)", "INTPTLAT", 11, 337),
    text("Internal Point (Longitude)", "INTPTLON", 12, 348),
    text("Legal/Statistical Area Description Code", "LSADC", 2, 360),
    text("Part Flag", "PARTFLAG", 1, 362),
    text("Reserved", "RESERVE3", 6, 363),
    text("Urban Growth Area", "UGA", 5, 369),
    text("State (ANSI)", "STATENS", 8, 374),
    text("County (ANSI)", "COUNTYNS", 8, 382),
    text("County Subdivision (ANSI)", "COUSUBNS", 8, 390),
    text("Place (ANSI)", "PLACENS", 8, 398),
    text("Consolidated City (ANSI)", "CONCITNS", 8, 406),
    text("American Indian Area/Alaska Native Area/Hawaiian Home Land (ANSI)", "AIANHHNS", 8, 414),
    text("American Indian Tribal Subdivision (ANSI)", "AITSNS", 8, 422),
    text("Alaska Native Regional Corporation (ANSI)", "ANRCNS", 8, 430),
    text("Subminor Civil Division (ANSI)", "SUBMCDNS", 8, 438),
    text("Congressional District (113th)", "CD113", 2, 446),
    text("Congressional District (114th)", "CD114", 2, 448),
    text("Congressional District (115th)", "CD115", 2, 450),
    text("State Legislative District (Upper Chamber) (Year 2)", "SLDU2", 3, 452),
    text("State Legislative District (Lower Chamber) (Year 2)", "SLDL2", 3, 455),
    text("State Legislative District (Upper Chamber) (Year 3)", "SLDU3", 3, 458),
    text("State Legislative District (Lower Chamber) (Year 3)", "SLDL3", 3, 461),
    text("State Legislative District (Upper Chamber) (Year 4)", "SLDU4", 3, 464),
    text("State Legislative District (Lower Chamber) (Year 4)", "SLDL4", 3, 467),
    text("American Indian Area/Alaska Native Area/Hawaiian Homeland size Code", "AIANHHSC", 2, 470),
    text("Combined Statistical Area Size Code", "CSASC", 2, 472),
    text("Combined NECTA Size Code", "CNECTASC", 2, 474),
    text("Metropolitan/Micropolitan Indicator", "MEMI", 1, 476),
    text("NECTA Metropolitan/Micropolitan Indicator", "NMEMI", 1, 477),
    text("Public Use Microdata Area", "PUMA", 5, 478),
    text("Reserved", "RESERVED", 18, 483),
];

/// Check that `fields` tile `[1, N]` with no gap or overlap and return N,
/// the length every data line must have.
pub fn validate_layout(fields: &[FieldDescriptor]) -> Result<usize> {
    let mut next = 1;
    for fd in fields {
        if fd.width == 0 {
            return Err(LoadError::drift(fd.reference_name, "field has zero width"));
        }
        if fd.position != next {
            return Err(LoadError::drift(
                fd.reference_name,
                format!(
                    "field starts at column {} but the previous field ends at {}",
                    fd.position,
                    next - 1
                ),
            ));
        }
        next = fd.position + fd.width;
    }
    Ok(next - 1)
}

/// `geo_locations` schema: one column per descriptor, in layout order.
pub fn geo_schema(fields: &[FieldDescriptor]) -> TableSchema {
    TableSchema {
        name: GEO_TABLE.to_string(),
        columns: fields
            .iter()
            .map(|fd| ColumnDef::new(fd.column_name(), fd.column_type()))
            .collect(),
    }
}
