//! Path templates such as `/pets/:id`, `/pets/{petId}/toys` or
//! `/reports/{id}.json`.

use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;

use crate::error::ConfigError;

static PARAM_SEGMENT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?::(?P<colon>[^/{}:]+)|\{(?P<brace>[^/{}:]+)\})$")
        .expect("static regex is valid")
});

static EMBEDDED_PARAM: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{(?P<name>[^/{}:]+)\}").expect("static regex is valid"));

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Param(String),
    /// Literal text around parameters within one segment, e.g. `{id}.json`
    Mixed(Vec<Part>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Part {
    Text(String),
    Param(String),
}

/// A parsed, qualified path template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathTemplate {
    segments: Vec<Segment>,
    trailing_slash: bool,
}

impl PathTemplate {
    pub fn parse(path: &str) -> Result<Self, ConfigError> {
        let invalid = |reason: &str| ConfigError::InvalidPath {
            path: path.to_string(),
            reason: reason.to_string(),
        };

        let trimmed = path.trim_start_matches('/');
        let trailing_slash = trimmed.len() > 1 && trimmed.ends_with('/');
        let mut segments = Vec::new();

        for raw in trimmed.split('/') {
            if raw.is_empty() {
                continue;
            }
            if let Some(caps) = PARAM_SEGMENT.captures(raw) {
                let name = caps
                    .name("colon")
                    .or_else(|| caps.name("brace"))
                    .map(|m| m.as_str().to_string())
                    .ok_or_else(|| invalid("empty parameter name"))?;
                segments.push(Segment::Param(name));
            } else if raw.contains(['{', '}']) {
                let parts = parse_mixed(raw)
                    .ok_or_else(|| invalid("malformed or adjacent parameters"))?;
                segments.push(Segment::Mixed(parts));
            } else if raw.starts_with(':') {
                return Err(invalid("invalid parameter name"));
            } else {
                segments.push(Segment::Literal(raw.to_string()));
            }
        }

        Ok(PathTemplate {
            segments,
            trailing_slash,
        })
    }

    /// Parameter names in declaration order.
    pub fn params(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().flat_map(|segment| {
            let names: Vec<&str> = match segment {
                Segment::Literal(_) => Vec::new(),
                Segment::Param(name) => vec![name.as_str()],
                Segment::Mixed(parts) => parts
                    .iter()
                    .filter_map(|part| match part {
                        Part::Param(name) => Some(name.as_str()),
                        Part::Text(_) => None,
                    })
                    .collect(),
            };
            names
        })
    }

    /// Name of the parameter identifying a row in an array resource.
    pub fn id_param(&self) -> Option<&str> {
        self.params().last()
    }

    /// Whether some segment mixes literal text and parameters. `matchit`
    /// cannot route these, so they are matched with [`PathTemplate::matcher`].
    pub fn has_mixed_segments(&self) -> bool {
        self.segments.iter().any(|s| matches!(s, Segment::Mixed(_)))
    }

    /// `matchit` pattern with parameters named by position (`{p0}`, `{p1}`).
    pub fn positional_pattern(&self) -> String {
        self.render(|i, _, _| format!("{{p{i}}}"))
    }

    /// Anchored regex over the whole path, capturing parameters by position.
    pub fn matcher(&self) -> Result<Regex, ConfigError> {
        let mut position = 0;
        let mut group = |whole: bool| {
            let class = if whole { "[^/]+" } else { "[^/]+?" };
            let group = format!("(?P<p{position}>{class})");
            position += 1;
            group
        };

        let mut pattern = String::from("^");
        for segment in &self.segments {
            pattern.push('/');
            match segment {
                Segment::Literal(lit) => pattern.push_str(&regex::escape(lit)),
                Segment::Param(_) => pattern.push_str(&group(true)),
                Segment::Mixed(parts) => {
                    for part in parts {
                        match part {
                            Part::Text(text) => pattern.push_str(&regex::escape(text)),
                            Part::Param(_) => pattern.push_str(&group(false)),
                        }
                    }
                }
            }
        }
        if self.segments.is_empty() || self.trailing_slash {
            pattern.push('/');
        }
        pattern.push('$');

        Regex::new(&pattern).map_err(|e| ConfigError::InvalidPath {
            path: self.to_string(),
            reason: e.to_string(),
        })
    }

    /// Render every segment, calling `param(position, name, whole_segment)`
    /// for each parameter.
    fn render(&self, param: impl Fn(usize, &str, bool) -> String) -> String {
        let mut out = String::new();
        let mut position = 0;
        for segment in &self.segments {
            out.push('/');
            match segment {
                Segment::Literal(lit) => out.push_str(lit),
                Segment::Param(name) => {
                    out.push_str(&param(position, name, true));
                    position += 1;
                }
                Segment::Mixed(parts) => {
                    for part in parts {
                        match part {
                            Part::Text(text) => out.push_str(text),
                            Part::Param(name) => {
                                out.push_str(&param(position, name, false));
                                position += 1;
                            }
                        }
                    }
                }
            }
        }
        if out.is_empty() || self.trailing_slash {
            out.push('/');
        }
        out
    }
}

impl fmt::Display for PathTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render(|_, name, whole| {
            if whole {
                format!(":{name}")
            } else {
                format!("{{{name}}}")
            }
        }))
    }
}

fn parse_mixed(raw: &str) -> Option<Vec<Part>> {
    let mut parts = Vec::new();
    let mut last = 0;
    for caps in EMBEDDED_PARAM.captures_iter(raw) {
        let whole = caps.get(0)?;
        let text = &raw[last..whole.start()];
        if !text.is_empty() {
            parts.push(Part::Text(text.to_string()));
        } else if matches!(parts.last(), Some(Part::Param(_))) {
            // `{a}{b}` has no boundary between the two values
            return None;
        }
        parts.push(Part::Param(caps["name"].to_string()));
        last = whole.end();
    }
    if last < raw.len() {
        parts.push(Part::Text(raw[last..].to_string()));
    }

    let well_formed = parts.iter().any(|p| matches!(p, Part::Param(_)))
        && parts.iter().all(|p| match p {
            Part::Text(text) => !text.contains(['{', '}']),
            Part::Param(_) => true,
        });
    well_formed.then_some(parts)
}

/// Join a plugin root path and a resource path, always starting with `/`.
pub fn qualify(root: Option<&str>, path: Option<&str>) -> String {
    let root = root.unwrap_or("").trim_end_matches('/');
    let path = path.unwrap_or("");

    let mut qualified = String::with_capacity(root.len() + path.len() + 2);
    if !root.is_empty() && !root.starts_with('/') {
        qualified.push('/');
    }
    qualified.push_str(root);
    if !path.is_empty() && !path.starts_with('/') {
        qualified.push('/');
    }
    qualified.push_str(path);

    if qualified.is_empty() {
        qualified.push('/');
    }
    qualified
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_qualify() {
        assert_eq!(qualify(Some("/api"), Some("/pets")), "/api/pets");
        assert_eq!(qualify(Some("api/"), Some("pets")), "/api/pets");
        assert_eq!(qualify(None, Some("pets/:id")), "/pets/:id");
        assert_eq!(qualify(Some("/api"), None), "/api");
        assert_eq!(qualify(None, None), "/");
    }

    #[test]
    fn test_parse_colon_and_brace_params() {
        let colon = PathTemplate::parse("/pets/:id/toys").unwrap();
        let brace = PathTemplate::parse("/pets/{id}/toys").unwrap();
        assert_eq!(colon, brace);
        assert_eq!(colon.positional_pattern(), "/pets/{p0}/toys");
        assert_eq!(colon.to_string(), "/pets/:id/toys");
    }

    #[test]
    fn test_id_param_is_last() {
        let template = PathTemplate::parse("/owners/:ownerId/pets/:petId").unwrap();
        assert_eq!(template.params().collect::<Vec<_>>(), vec!["ownerId", "petId"]);
        assert_eq!(template.id_param(), Some("petId"));
        assert_eq!(PathTemplate::parse("/pets").unwrap().id_param(), None);
    }

    #[test]
    fn test_root_and_trailing_slash() {
        assert_eq!(PathTemplate::parse("/").unwrap().positional_pattern(), "/");
        assert_eq!(PathTemplate::parse("/pets/").unwrap().positional_pattern(), "/pets/");
        assert!(PathTemplate::parse("/pets/").unwrap().matcher().unwrap().is_match("/pets/"));
    }

    #[test]
    fn test_param_within_segment() {
        let template = PathTemplate::parse("/reports/{id}.json").unwrap();
        assert!(template.has_mixed_segments());
        assert_eq!(template.id_param(), Some("id"));
        assert_eq!(template.positional_pattern(), "/reports/{p0}.json");
        assert_eq!(template.to_string(), "/reports/{id}.json");

        let matcher = template.matcher().unwrap();
        let caps = matcher.captures("/reports/q3.summary.json").unwrap();
        assert_eq!(&caps["p0"], "q3.summary");
        assert!(!matcher.is_match("/reports/q3json"));
        assert!(!matcher.is_match("/reports/a/b.json"));
    }

    #[test]
    fn test_several_params_within_segment() {
        let template = PathTemplate::parse("/tiles/{z}-{x}.png/:format").unwrap();
        assert_eq!(template.params().collect::<Vec<_>>(), vec!["z", "x", "format"]);
        let caps = template.matcher().unwrap().captures("/tiles/3-7.png/raw").unwrap();
        assert_eq!((&caps["p0"], &caps["p1"], &caps["p2"]), ("3", "7", "raw"));
        assert!(!PathTemplate::parse("/pets").unwrap().has_mixed_segments());
    }

    #[test]
    fn test_malformed_params_rejected() {
        for path in ["/files/{a}{b}", "/files/{name", "/files/name}.json", "/pets/:"] {
            assert!(
                matches!(PathTemplate::parse(path), Err(ConfigError::InvalidPath { .. })),
                "{path} should be rejected"
            );
        }
    }
}
