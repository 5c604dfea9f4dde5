//! Radix-trie route lookup for registered resources.
//!
//! One `matchit` router per HTTP method plus one for `ANY` resources. A
//! request is looked up in its method's router first and only falls back to
//! the `ANY` router on a miss, so an exact method always wins over a wildcard.
//! Within a router, literal segments take priority over parameters.
//!
//! Parameters are registered positionally (`{p0}`, `{p1}`, ...) and renamed
//! on the way out, which makes `/a/:id` and `/a/:name` the same route.
//!
//! Templates with a parameter inside a segment (`/reports/{id}.json`) are
//! beyond `matchit` and are kept as anchored regexes per method. For a given
//! method a fully literal route wins, then such a template, then a plain
//! parameter route.

use indexmap::IndexMap;
use matchit::Router;
use regex::Regex;
use std::collections::{HashMap, HashSet};
use tracing::debug;

use super::path::PathTemplate;
use crate::config::ResourceMethod;
use crate::error::ConfigError;

/// Path parameters bound by a match, in template order.
pub type PathParams = IndexMap<String, String>;

/// A route to register: resource id, method, template.
pub struct RouteEntry<'a> {
    pub id: usize,
    pub method: ResourceMethod,
    pub template: &'a PathTemplate,
}

#[derive(Debug, Default)]
pub struct ResourceIndex {
    routers: HashMap<ResourceMethod, Router<usize>>,
    /// Templates with mixed segments, in registration order.
    patterns: HashMap<ResourceMethod, Vec<(Regex, usize)>>,
    param_names: HashMap<usize, Vec<String>>,
    route_count: usize,
}

impl ResourceIndex {
    pub fn build<'a>(
        routes: impl IntoIterator<Item = RouteEntry<'a>>,
    ) -> Result<Self, ConfigError> {
        let mut index = ResourceIndex::default();
        let mut seen: HashSet<(ResourceMethod, String)> = HashSet::new();

        for route in routes {
            let key = route.template.positional_pattern();
            if !seen.insert((route.method, key.clone())) {
                return Err(ConfigError::DuplicateRoute {
                    method: route.method.to_string(),
                    path: route.template.to_string(),
                });
            }

            if route.template.has_mixed_segments() {
                index
                    .patterns
                    .entry(route.method)
                    .or_default()
                    .push((route.template.matcher()?, route.id));
            } else {
                index
                    .routers
                    .entry(route.method)
                    .or_default()
                    .insert(key.clone(), route.id)
                    .map_err(|e| ConfigError::AmbiguousRoute {
                        path: route.template.to_string(),
                        reason: e.to_string(),
                    })?;
            }

            index.param_names.insert(
                route.id,
                route.template.params().map(str::to_string).collect(),
            );
            index.route_count += 1;
            debug!("Indexed {} {} as {}", route.method, route.template, key);
        }

        Ok(index)
    }

    /// Find the resource for a request, binding its path parameters.
    pub fn lookup(&self, method: &str, path: &str) -> Option<(usize, PathParams)> {
        let exact = method.parse::<ResourceMethod>().ok().filter(|m| *m != ResourceMethod::Any);

        exact
            .and_then(|m| self.lookup_method(m, path))
            .or_else(|| self.lookup_method(ResourceMethod::Any, path))
    }

    fn lookup_method(&self, method: ResourceMethod, path: &str) -> Option<(usize, PathParams)> {
        let routed = self.routers.get(&method).and_then(|router| router.at(path).ok());

        if let Some(found) = &routed {
            let id = *found.value;
            if self.param_names.get(&id).is_some_and(Vec::is_empty) {
                return Some((id, PathParams::new()));
            }
        }

        let patterned = self.patterns.get(&method).and_then(|patterns| {
            patterns
                .iter()
                .find_map(|(regex, id)| regex.captures(path).map(|caps| (*id, caps)))
        });
        if let Some((id, caps)) = patterned {
            let params = self.bind(id, |key| caps.name(key).map(|m| m.as_str()))?;
            return Some((id, params));
        }

        let found = routed?;
        let id = *found.value;
        let params = self.bind(id, |key| found.params.get(key))?;
        Some((id, params))
    }

    /// Rename positional captures (`p0`, `p1`, ...) to the template's names.
    fn bind<'p>(
        &self,
        id: usize,
        capture: impl Fn(&str) -> Option<&'p str>,
    ) -> Option<PathParams> {
        let names = self.param_names.get(&id)?;
        let mut params = PathParams::with_capacity(names.len());
        for (i, name) in names.iter().enumerate() {
            if let Some(raw) = capture(&format!("p{i}")) {
                let value = urlencoding::decode(raw)
                    .map(|v| v.into_owned())
                    .unwrap_or_else(|_| raw.to_string());
                params.insert(name.clone(), value);
            }
        }
        Some(params)
    }

    pub fn len(&self) -> usize {
        self.route_count
    }

    pub fn is_empty(&self) -> bool {
        self.route_count == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build(routes: &[(ResourceMethod, &str)]) -> Result<ResourceIndex, ConfigError> {
        let templates: Vec<PathTemplate> = routes
            .iter()
            .map(|(_, p)| PathTemplate::parse(p).unwrap())
            .collect();
        ResourceIndex::build(routes.iter().zip(&templates).enumerate().map(
            |(id, ((method, _), template))| RouteEntry {
                id,
                method: *method,
                template,
            },
        ))
    }

    #[test]
    fn test_literal_beats_param() {
        let index = build(&[
            (ResourceMethod::Get, "/pets/:id"),
            (ResourceMethod::Get, "/pets/mine"),
        ])
        .unwrap();

        assert_eq!(index.lookup("GET", "/pets/mine").unwrap().0, 1);
        let (id, params) = index.lookup("GET", "/pets/42").unwrap();
        assert_eq!(id, 0);
        assert_eq!(params.get("id").map(String::as_str), Some("42"));
    }

    #[test]
    fn test_exact_method_beats_any() {
        let index = build(&[
            (ResourceMethod::Any, "/pets"),
            (ResourceMethod::Post, "/pets"),
        ])
        .unwrap();

        assert_eq!(index.lookup("POST", "/pets").unwrap().0, 1);
        assert_eq!(index.lookup("DELETE", "/pets").unwrap().0, 0);
        assert_eq!(index.len(), 2);
    }

    #[test]
    fn test_method_mismatch_is_no_match() {
        let index = build(&[(ResourceMethod::Get, "/pets")]).unwrap();
        assert!(index.lookup("PUT", "/pets").is_none());
        assert!(index.lookup("GET", "/owners").is_none());
    }

    #[test]
    fn test_params_are_percent_decoded() {
        let index = build(&[(ResourceMethod::Get, "/files/{name}")]).unwrap();
        let (_, params) = index.lookup("GET", "/files/a%20b").unwrap();
        assert_eq!(params["name"], "a b");
    }

    #[test]
    fn test_same_shape_different_names_is_duplicate() {
        let err = build(&[
            (ResourceMethod::Get, "/a/:id"),
            (ResourceMethod::Get, "/a/:name"),
        ])
        .unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateRoute { .. }));
    }

    #[test]
    fn test_param_within_segment() {
        let index = build(&[
            (ResourceMethod::Get, "/reports/:id"),
            (ResourceMethod::Get, "/reports/{id}.json"),
            (ResourceMethod::Get, "/reports/latest.json"),
        ])
        .unwrap();

        let (id, params) = index.lookup("GET", "/reports/q%203.json").unwrap();
        assert_eq!(id, 1);
        assert_eq!(params["id"], "q 3");

        assert_eq!(index.lookup("GET", "/reports/latest.json").unwrap().0, 2);
        assert_eq!(index.lookup("GET", "/reports/q3.csv").unwrap().0, 0);
        assert!(index.lookup("POST", "/reports/q3.json").is_none());
        assert_eq!(index.len(), 3);
    }

    #[test]
    fn test_param_within_segment_duplicate() {
        let err = build(&[
            (ResourceMethod::Get, "/reports/{id}.json"),
            (ResourceMethod::Get, "/reports/{name}.json"),
        ])
        .unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateRoute { .. }));
    }

    #[test]
    fn test_same_shape_different_methods_ok() {
        let index = build(&[
            (ResourceMethod::Get, "/a/:id"),
            (ResourceMethod::Delete, "/a/:name"),
        ])
        .unwrap();
        let (_, params) = index.lookup("DELETE", "/a/7").unwrap();
        assert_eq!(params["name"], "7");
    }
}
