//! Fixed column layout of the raw land-registry sale file (pipe-delimited)

pub const DATE: usize = 8;
pub const SALE_TYPE: usize = 9;
pub const PRICE: usize = 10;
pub const STREET_NUMBER: usize = 11;
pub const STREET_COMPLEMENT: usize = 12;
pub const STREET_TYPE: usize = 13;
pub const STREET_NAME: usize = 15;
pub const ZIP: usize = 16;
pub const CITY: usize = 17;
pub const DEPARTMENT: usize = 18;
pub const CITY_LOCAL_CODE: usize = 19;
pub const CADASTRE_SECTION: usize = 21;
pub const CADASTRE_PARCEL: usize = 22;
pub const PROPERTY_TYPE: usize = 36;
pub const BUILT_AREA: usize = 38;
pub const ROOM_COUNT: usize = 39;
pub const CULTURE_TYPE: usize = 40;
pub const TOTAL_AREA: usize = 42;

/// Minimum number of fields a row needs to be interpreted
pub const COLUMN_COUNT: usize = TOTAL_AREA + 1;

/// Field delimiter of the raw file
pub const DELIMITER: u8 = b'|';

pub const HOUSE: &str = "Maison";
pub const SALE: &str = "Vente";
