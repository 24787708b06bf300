//! IIIF Image API request parameters
//!
//! Each type parses one path segment of an image request
//! (`{region}/{size}/{rotation}/{quality}.{format}`) and renders back to the
//! canonical segment.

use crate::errors::{AppError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum Region {
    #[default]
    Full,
    Square,
    Pixels { x: u32, y: u32, w: u32, h: u32 },
    Percent { x: f32, y: f32, w: f32, h: f32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum Size {
    Full,
    #[default]
    Max,
    Width(u32),
    Height(u32),
    Percent(f32),
    Exact { w: u32, h: u32 },
    /// `!w,h`: scale to fit inside the box, keeping aspect ratio
    BestFit { w: u32, h: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rotation {
    pub degrees: u32,
    pub mirror: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Quality {
    #[default]
    Default,
    Color,
    Gray,
    Bitonal,
    Native,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    #[default]
    Jpg,
    Png,
    Tif,
    Gif,
    Jp2,
    Pdf,
    Webp,
}

/// A complete image request
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ImageParams {
    pub region: Region,
    pub size: Size,
    pub rotation: Rotation,
    pub quality: Quality,
    pub format: Format,
}

fn invalid(segment: &str, value: &str) -> AppError {
    AppError::Validation {
        message: format!("Invalid IIIF {} '{}'", segment, value),
        field: Some(segment.to_string()),
    }
}

fn parse_list<T: FromStr>(value: &str, expected: usize) -> Option<Vec<T>> {
    let parts: Vec<T> = value
        .split(',')
        .map(|p| p.trim().parse::<T>())
        .collect::<std::result::Result<_, _>>()
        .ok()?;
    (parts.len() == expected).then_some(parts)
}

impl FromStr for Region {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "full" => Ok(Region::Full),
            "square" => Ok(Region::Square),
            _ => {
                if let Some(pct) = s.strip_prefix("pct:") {
                    let v = parse_list::<f32>(pct, 4).ok_or_else(|| invalid("region", s))?;
                    if v.iter().any(|n| !n.is_finite() || *n < 0.0) {
                        return Err(invalid("region", s));
                    }
                    Ok(Region::Percent { x: v[0], y: v[1], w: v[2], h: v[3] })
                } else {
                    let v = parse_list::<u32>(s, 4).ok_or_else(|| invalid("region", s))?;
                    if v[2] == 0 || v[3] == 0 {
                        return Err(invalid("region", s));
                    }
                    Ok(Region::Pixels { x: v[0], y: v[1], w: v[2], h: v[3] })
                }
            }
        }
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Region::Full => write!(f, "full"),
            Region::Square => write!(f, "square"),
            Region::Pixels { x, y, w, h } => write!(f, "{},{},{},{}", x, y, w, h),
            Region::Percent { x, y, w, h } => write!(f, "pct:{},{},{},{}", x, y, w, h),
        }
    }
}

impl FromStr for Size {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        let err = || invalid("size", s);
        match s {
            "full" => return Ok(Size::Full),
            "max" => return Ok(Size::Max),
            _ => {}
        }
        if let Some(pct) = s.strip_prefix("pct:") {
            let p: f32 = pct.parse().map_err(|_| err())?;
            if !p.is_finite() || p <= 0.0 {
                return Err(err());
            }
            return Ok(Size::Percent(p));
        }
        let (best_fit, dims) = match s.strip_prefix('!') {
            Some(rest) => (true, rest),
            None => (false, s),
        };
        let (w, h) = dims.split_once(',').ok_or_else(err)?;
        let parse = |v: &str| -> Result<Option<u32>> {
            if v.is_empty() {
                Ok(None)
            } else {
                v.parse::<u32>().map(Some).map_err(|_| err())
            }
        };
        match (parse(w)?, parse(h)?) {
            (Some(w), Some(h)) if best_fit => Ok(Size::BestFit { w, h }),
            (Some(w), Some(h)) => Ok(Size::Exact { w, h }),
            (Some(w), None) if !best_fit => Ok(Size::Width(w)),
            (None, Some(h)) if !best_fit => Ok(Size::Height(h)),
            _ => Err(err()),
        }
    }
}

impl fmt::Display for Size {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Size::Full => write!(f, "full"),
            Size::Max => write!(f, "max"),
            Size::Width(w) => write!(f, "{},", w),
            Size::Height(h) => write!(f, ",{}", h),
            Size::Percent(p) => write!(f, "pct:{}", p),
            Size::Exact { w, h } => write!(f, "{},{}", w, h),
            Size::BestFit { w, h } => write!(f, "!{},{}", w, h),
        }
    }
}

impl Size {
    /// Clamp pixel dimensions to a maximum box; relative sizes are left alone
    pub fn clamped(self, max_width: u32, max_height: u32) -> Size {
        match self {
            Size::Width(w) => Size::Width(w.min(max_width)),
            Size::Height(h) => Size::Height(h.min(max_height)),
            Size::Exact { w, h } => Size::Exact { w: w.min(max_width), h: h.min(max_height) },
            Size::BestFit { w, h } => Size::BestFit { w: w.min(max_width), h: h.min(max_height) },
            other => other,
        }
    }
}

impl FromStr for Rotation {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        let (mirror, degrees) = match s.strip_prefix('!') {
            Some(rest) => (true, rest),
            None => (false, s),
        };
        let degrees: u32 = degrees.parse().map_err(|_| invalid("rotation", s))?;
        if degrees > 360 {
            return Err(invalid("rotation", s));
        }
        Ok(Rotation { degrees, mirror })
    }
}

impl fmt::Display for Rotation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.mirror {
            write!(f, "!{}", self.degrees)
        } else {
            write!(f, "{}", self.degrees)
        }
    }
}

impl FromStr for Quality {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "default" => Ok(Quality::Default),
            "color" => Ok(Quality::Color),
            "gray" | "grey" => Ok(Quality::Gray),
            "bitonal" => Ok(Quality::Bitonal),
            "native" => Ok(Quality::Native),
            _ => Err(invalid("quality", s)),
        }
    }
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Quality::Default => "default",
            Quality::Color => "color",
            Quality::Gray => "gray",
            Quality::Bitonal => "bitonal",
            Quality::Native => "native",
        };
        f.write_str(s)
    }
}

impl Format {
    pub fn extension(&self) -> &'static str {
        match self {
            Format::Jpg => "jpg",
            Format::Png => "png",
            Format::Tif => "tif",
            Format::Gif => "gif",
            Format::Jp2 => "jp2",
            Format::Pdf => "pdf",
            Format::Webp => "webp",
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            Format::Jpg => "image/jpeg",
            Format::Png => "image/png",
            Format::Tif => "image/tiff",
            Format::Gif => "image/gif",
            Format::Jp2 => "image/jp2",
            Format::Pdf => "application/pdf",
            Format::Webp => "image/webp",
        }
    }

    pub fn from_mime_type(mime: &str) -> Option<Format> {
        match mime.trim().to_ascii_lowercase().as_str() {
            "image/jpeg" | "image/jpg" => Some(Format::Jpg),
            "image/png" => Some(Format::Png),
            "image/tiff" | "image/tif" => Some(Format::Tif),
            "image/gif" => Some(Format::Gif),
            "image/jp2" => Some(Format::Jp2),
            "application/pdf" => Some(Format::Pdf),
            "image/webp" => Some(Format::Webp),
            _ => None,
        }
    }

    /// Format from a file name or url extension; query strings are ignored
    pub fn from_filename(name: &str) -> Option<Format> {
        let path = name.split(['?', '#']).next().unwrap_or(name);
        let file = path.rsplit('/').next().unwrap_or(path);
        let (_, ext) = file.rsplit_once('.')?;
        ext.parse().ok()
    }
}

impl FromStr for Format {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "jpg" | "jpeg" => Ok(Format::Jpg),
            "png" => Ok(Format::Png),
            "tif" | "tiff" => Ok(Format::Tif),
            "gif" => Ok(Format::Gif),
            "jp2" => Ok(Format::Jp2),
            "pdf" => Ok(Format::Pdf),
            "webp" => Ok(Format::Webp),
            _ => Err(invalid("format", s)),
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl fmt::Display for ImageParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}/{}.{}",
            self.region, self.size, self.rotation, self.quality, self.format
        )
    }
}

impl ImageParams {
    pub fn with_size(size: Size) -> Self {
        Self { size, ..Self::default() }
    }
}

/// Optional replacements applied to an existing image url
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ParamChanges {
    pub region: Option<Region>,
    pub size: Option<Size>,
    pub rotation: Option<Rotation>,
    pub quality: Option<Quality>,
    pub format: Option<Format>,
}

impl ParamChanges {
    /// Parse the string form used by query parameters; empty strings are "unchanged"
    pub fn parse(
        region: Option<&str>,
        size: Option<&str>,
        rotation: Option<&str>,
        quality: Option<&str>,
        format: Option<&str>,
    ) -> Result<Self> {
        fn opt<T: FromStr<Err = AppError>>(v: Option<&str>) -> Result<Option<T>> {
            match v.map(str::trim).filter(|s| !s.is_empty()) {
                Some(s) => s.parse().map(Some),
                None => Ok(None),
            }
        }
        Ok(Self {
            region: opt(region)?,
            size: opt(size)?,
            rotation: opt(rotation)?,
            quality: opt(quality)?,
            format: opt(format)?,
        })
    }

    /// Fill in defaults for every unchanged segment
    pub fn apply_to(&self, base: ImageParams) -> ImageParams {
        ImageParams {
            region: self.region.unwrap_or(base.region),
            size: self.size.unwrap_or(base.size),
            rotation: self.rotation.unwrap_or(base.rotation),
            quality: self.quality.unwrap_or(base.quality),
            format: self.format.unwrap_or(base.format),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_region_parsing() {
        assert_eq!("full".parse::<Region>().unwrap(), Region::Full);
        assert_eq!(
            "10,20,300,400".parse::<Region>().unwrap(),
            Region::Pixels { x: 10, y: 20, w: 300, h: 400 }
        );
        assert_eq!(
            "pct:10,10,50.5,50".parse::<Region>().unwrap().to_string(),
            "pct:10,10,50.5,50"
        );
        assert!("10,20,0,400".parse::<Region>().is_err());
        assert!("10,20,30".parse::<Region>().is_err());
    }

    #[test]
    fn test_size_variants() {
        assert_eq!("max".parse::<Size>().unwrap(), Size::Max);
        assert_eq!("600,".parse::<Size>().unwrap(), Size::Width(600));
        assert_eq!(",400".parse::<Size>().unwrap(), Size::Height(400));
        assert_eq!("!800,600".parse::<Size>().unwrap(), Size::BestFit { w: 800, h: 600 });
        assert_eq!("800,600".parse::<Size>().unwrap(), Size::Exact { w: 800, h: 600 });
        assert_eq!("pct:50".parse::<Size>().unwrap().to_string(), "pct:50");
        assert!("!800,".parse::<Size>().is_err());
        assert!(",".parse::<Size>().is_err());
        assert!("big".parse::<Size>().is_err());
    }

    #[test]
    fn test_non_finite_percentages_are_rejected() {
        assert!("pct:NaN,0,50,50".parse::<Region>().is_err());
        assert!("pct:0,0,inf,50".parse::<Region>().is_err());
        assert!("pct:inf".parse::<Size>().is_err());
        assert!("pct:NaN".parse::<Size>().is_err());
        assert!("pct:-infinity".parse::<Size>().is_err());
    }

    #[test]
    fn test_size_clamping() {
        assert_eq!(Size::Width(20000).clamped(5000, 5000), Size::Width(5000));
        assert_eq!(
            Size::BestFit { w: 100, h: 9000 }.clamped(5000, 5000),
            Size::BestFit { w: 100, h: 5000 }
        );
        assert_eq!(Size::Max.clamped(10, 10), Size::Max);
    }

    #[test]
    fn test_rotation() {
        assert_eq!("!90".parse::<Rotation>().unwrap().to_string(), "!90");
        assert!("400".parse::<Rotation>().is_err());
    }

    #[test]
    fn test_format_detection() {
        assert_eq!(Format::from_filename("00000001.tif"), Some(Format::Tif));
        assert_eq!(Format::from_filename("http://x.org/img/a.JPEG?x=1"), Some(Format::Jpg));
        assert_eq!(Format::from_filename("noext"), None);
        assert_eq!(Format::from_mime_type("image/png"), Some(Format::Png));
        assert_eq!(Format::Jp2.mime_type(), "image/jp2");
    }

    #[test]
    fn test_default_params_render() {
        assert_eq!(ImageParams::default().to_string(), "full/max/0/default.jpg");
    }

    #[test]
    fn test_param_changes_ignore_empty() {
        let changes = ParamChanges::parse(Some(""), Some("!200,200"), None, Some("gray"), None).unwrap();
        assert_eq!(changes.region, None);
        assert_eq!(changes.size, Some(Size::BestFit { w: 200, h: 200 }));
        let params = changes.apply_to(ImageParams::default());
        assert_eq!(params.to_string(), "full/!200,200/0/gray.jpg");
    }
}
