//! Index field names shared by record, page and archive documents

pub const PI: &str = "PI";
pub const PI_TOPSTRUCT: &str = "PI_TOPSTRUCT";
pub const IDDOC: &str = "IDDOC";
pub const DOCTYPE: &str = "DOCTYPE";
pub const DOCSTRCT: &str = "DOCSTRCT";
pub const LOGID: &str = "LOGID";
pub const LABEL: &str = "LABEL";
pub const ORDER: &str = "ORDER";
pub const FILENAME: &str = "FILENAME";
pub const MIMETYPE: &str = "MIMETYPE";
pub const WIDTH: &str = "WIDTH";
pub const HEIGHT: &str = "HEIGHT";
pub const THUMBNAIL: &str = "THUMBNAIL";
pub const THUMBPAGENO: &str = "THUMBPAGENO";
pub const ISANCHOR: &str = "ISANCHOR";
pub const ISWORK: &str = "ISWORK";
pub const URN: &str = "URN";
pub const IMAGEURN: &str = "IMAGEURN";
pub const ACCESSCONDITION: &str = "ACCESSCONDITION";
pub const EAD_NODE_ID: &str = "EAD_NODE_ID";
pub const WKT_COORDS: &str = "WKT_COORDS";
pub const MD_GEOJSON_POINT: &str = "MD_GEOJSON_POINT";

/// `DOCTYPE` values
pub const DOCTYPE_DOCSTRCT: &str = "DOCSTRCT";
pub const DOCTYPE_PAGE: &str = "PAGE";

/// Access condition granting unrestricted access
pub const OPEN_ACCESS: &str = "OPENACCESS";
