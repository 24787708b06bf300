//! W3C web annotations on record pages
//!
//! Annotations are stored as [`Annotation`] rows and exchanged as W3C Web
//! Annotation JSON. The IIIF presentation layer gets them as v2
//! `sc:AnnotationList`s of OpenAnnotation resources.

use crate::db::models::Annotation;
use crate::errors::{AppError, Result};
use crate::iiif::ApiUrls;
use serde_json::{json, Map, Value};

pub const W3C_CONTEXT: &str = "http://www.w3.org/ns/anno.jsonld";
pub const IIIF_V2_CONTEXT: &str = "http://iiif.io/api/presentation/2/context.json";
pub const DEFAULT_MOTIVATION: &str = "commenting";

/// Data of an annotation received from a client, ready to be stored
#[derive(Debug, Clone, PartialEq)]
pub struct AnnotationDraft {
    pub motivation: String,
    pub body: Value,
    pub target: Value,
    pub target_pi: String,
    pub target_page: Option<i32>,
}

/// Canvas url of a target: either a plain url string or an object with `source`/`id`
fn target_source(target: &Value) -> Option<&str> {
    match target {
        Value::String(s) => Some(s.as_str()),
        Value::Object(o) => o
            .get("source")
            .or_else(|| o.get("id"))
            .or_else(|| o.get("@id"))
            .and_then(|v| match v {
                Value::String(s) => Some(s.as_str()),
                Value::Object(inner) => inner.get("id").or_else(|| inner.get("@id")).and_then(Value::as_str),
                _ => None,
            }),
        _ => None,
    }
}

/// Render a stored annotation as W3C Web Annotation JSON
pub fn to_web_annotation(annotation: &Annotation, urls: &ApiUrls) -> Value {
    let mut out = Map::new();
    out.insert("@context".into(), json!(W3C_CONTEXT));
    out.insert("id".into(), json!(urls.annotation(annotation.id)));
    out.insert("type".into(), json!("Annotation"));
    out.insert("motivation".into(), json!(annotation.motivation));
    out.insert("body".into(), annotation.body.clone());
    out.insert("target".into(), annotation.target.clone());
    out.insert("created".into(), json!(annotation.date_created.to_rfc3339()));
    if let Some(modified) = annotation.date_modified {
        out.insert("modified".into(), json!(modified.to_rfc3339()));
    }
    Value::Object(out)
}

/// Read W3C Web Annotation JSON; the target must be a canvas of this viewer
pub fn from_web_annotation(value: &Value, urls: &ApiUrls) -> Result<AnnotationDraft> {
    let object = value
        .as_object()
        .ok_or_else(|| AppError::validation("Annotation must be a JSON object"))?;

    let target = object.get("target").cloned().ok_or_else(|| AppError::Validation {
        message: "Annotation has no target".to_string(),
        field: Some("target".to_string()),
    })?;

    let source = target_source(&target).ok_or_else(|| AppError::Validation {
        message: "Annotation target has no canvas url".to_string(),
        field: Some("target".to_string()),
    })?;

    let (pi, order) = urls.parse_canvas(source).ok_or_else(|| AppError::Validation {
        message: format!("Annotation target {} is not a canvas of this viewer", source),
        field: Some("target".to_string()),
    })?;

    let motivation = object
        .get("motivation")
        .and_then(Value::as_str)
        .filter(|m| !m.trim().is_empty())
        .unwrap_or(DEFAULT_MOTIVATION)
        .to_string();

    Ok(AnnotationDraft {
        motivation,
        body: object.get("body").cloned().unwrap_or(Value::Null),
        target,
        target_pi: pi,
        target_page: i32::try_from(order).ok(),
    })
}

/// OpenAnnotation resource of a stored annotation
fn open_annotation(annotation: &Annotation, urls: &ApiUrls) -> Value {
    let resource = match &annotation.body {
        Value::Object(body) => json!({
            "@type": "dctypes:Text",
            "format": body.get("format").and_then(Value::as_str).unwrap_or("text/plain"),
            "chars": body.get("value").and_then(Value::as_str).unwrap_or_default(),
        }),
        Value::String(text) => json!({ "@type": "dctypes:Text", "format": "text/plain", "chars": text }),
        other => other.clone(),
    };

    let on = match &annotation.target {
        Value::String(s) => json!(s),
        target => match (target_source(target), target.pointer("/selector/value").and_then(Value::as_str)) {
            (Some(source), Some(selector)) => json!(format!("{}#{}", source, selector)),
            (Some(source), None) => json!(source),
            _ => target.clone(),
        },
    };

    json!({
        "@id": urls.annotation(annotation.id),
        "@type": "oa:Annotation",
        "motivation": format!("oa:{}", annotation.motivation),
        "resource": resource,
        "on": on,
    })
}

/// IIIF presentation v2 annotation list of one page
pub fn annotation_list(pi: &str, order: u32, annotations: &[Annotation], urls: &ApiUrls) -> Value {
    json!({
        "@context": IIIF_V2_CONTEXT,
        "@id": urls.annotation_list(pi, order),
        "@type": "sc:AnnotationList",
        "resources": annotations.iter().map(|a| open_annotation(a, urls)).collect::<Vec<_>>(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn urls() -> ApiUrls {
        ApiUrls::new("https://viewer.example.org/api/v1/")
    }

    fn stored() -> Annotation {
        Annotation {
            id: 5,
            motivation: "commenting".into(),
            body: json!({"type": "TextualBody", "value": "A seal", "format": "text/plain"}),
            target: json!({
                "source": "https://viewer.example.org/api/v1/records/PPN1/pages/2/canvas/",
                "selector": {"type": "FragmentSelector", "value": "xywh=10,20,30,40"}
            }),
            creator_id: None,
            target_pi: "PPN1".into(),
            target_page: Some(2),
            date_created: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap().into(),
            date_modified: None,
        }
    }

    #[test]
    fn test_to_web_annotation() {
        let json = to_web_annotation(&stored(), &urls());
        assert_eq!(json["@context"], W3C_CONTEXT);
        assert_eq!(json["id"], "https://viewer.example.org/api/v1/annotations/5/");
        assert_eq!(json["type"], "Annotation");
        assert_eq!(json["body"]["value"], "A seal");
        assert_eq!(json["created"], "2024-05-01T12:00:00+00:00");
        assert!(json.get("modified").is_none());
    }

    #[test]
    fn test_from_web_annotation() {
        let input = json!({
            "type": "Annotation",
            "body": {"type": "TextualBody", "value": "Note"},
            "target": "https://viewer.example.org/api/v1/records/PPN9/pages/4/canvas/#xywh=0,0,5,5"
        });
        let draft = from_web_annotation(&input, &urls()).unwrap();
        assert_eq!(draft.target_pi, "PPN9");
        assert_eq!(draft.target_page, Some(4));
        assert_eq!(draft.motivation, DEFAULT_MOTIVATION);

        let with_object = to_web_annotation(&stored(), &urls());
        let draft = from_web_annotation(&with_object, &urls()).unwrap();
        assert_eq!(draft.target_pi, "PPN1");
        assert_eq!(draft.target_page, Some(2));
    }

    #[test]
    fn test_foreign_canvas_rejected() {
        let input = json!({
            "body": "x",
            "target": "https://elsewhere.org/iiif/records/PPN9/pages/4/canvas/"
        });
        assert!(matches!(
            from_web_annotation(&input, &urls()),
            Err(AppError::Validation { .. })
        ));
        assert!(from_web_annotation(&json!({"body": "x"}), &urls()).is_err());
        assert!(from_web_annotation(&json!("nope"), &urls()).is_err());
    }

    #[test]
    fn test_annotation_list() {
        let list = annotation_list("PPN1", 2, &[stored()], &urls());
        assert_eq!(list["@type"], "sc:AnnotationList");
        assert_eq!(list["@id"], "https://viewer.example.org/api/v1/records/PPN1/pages/2/annotations/");
        let resource = &list["resources"][0];
        assert_eq!(resource["@type"], "oa:Annotation");
        assert_eq!(resource["motivation"], "oa:commenting");
        assert_eq!(resource["resource"]["chars"], "A seal");
        assert_eq!(
            resource["on"],
            "https://viewer.example.org/api/v1/records/PPN1/pages/2/canvas/#xywh=10,20,30,40"
        );
    }
}
