use crate::api::{ApiError, ApiResult};
use crate::model::{Eid, EntityRef};
use reqwest::Url;
use std::collections::BTreeMap;
use std::fmt;

/// Editor screens reachable from the CMS front page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Route {
    Edit,
    Tree,
    Add,
    Alert,
    AddService,
    EditServiceList,
    EditRelated,
    EditLocationAuthority,
    EditAgentAuthority,
    EditSubjectAuthority,
    /// Carries a `language` parameter.
    Translate,
    Delete,
    FaTask,
    AddUser,
    CwUsers,
    AddGlossaryTerm,
    AddFaq,
    AddSiteLink,
    HomepageMetadata,
    PublishTask,
    FaTasks,
    FaBord,
    EditIndex,
    SameAs,
    GroupAuth,
    BlackAuth,
    CssImage,
    SectionThemes,
}

/// Matched in this order; the first pattern that matches wins.
const ROUTES: &[(&str, Route)] = &[
    ("/edit", Route::Edit),
    ("/tree", Route::Tree),
    ("/add", Route::Add),
    ("/alert", Route::Alert),
    ("/add-service", Route::AddService),
    ("/edit-service-list", Route::EditServiceList),
    ("/editrelated", Route::EditRelated),
    ("/editlocationauthority", Route::EditLocationAuthority),
    ("/editagentauthority", Route::EditAgentAuthority),
    ("/editsubjectauthority", Route::EditSubjectAuthority),
    ("/translate_:language", Route::Translate),
    ("/delete", Route::Delete),
    ("/fatask", Route::FaTask),
    ("/add-user", Route::AddUser),
    ("/cwusers", Route::CwUsers),
    ("/add-glossaryterm", Route::AddGlossaryTerm),
    ("/add-faq", Route::AddFaq),
    ("/add-sitelink", Route::AddSiteLink),
    ("/homepage-metadata", Route::HomepageMetadata),
    ("/publish-task", Route::PublishTask),
    ("/fa-tasks", Route::FaTasks),
    ("/fa-bord", Route::FaBord),
    ("/edit-index", Route::EditIndex),
    ("/sameas", Route::SameAs),
    ("/group-auth", Route::GroupAuth),
    ("/black-auth", Route::BlackAuth),
    ("/cssimage", Route::CssImage),
    ("/section-themes", Route::SectionThemes),
];

impl Route {
    pub fn pattern(&self) -> &'static str {
        ROUTES
            .iter()
            .find(|(_, route)| route == self)
            .map(|(pattern, _)| *pattern)
            .unwrap_or("/")
    }

    /// Target type the authority editors restrict their relation to.
    pub fn target_type(&self) -> Option<&'static str> {
        match self {
            Route::EditLocationAuthority => Some("LocationAuthority"),
            Route::EditAgentAuthority => Some("AgentAuthority"),
            Route::EditSubjectAuthority => Some("SubjectAuthority"),
            _ => None,
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.pattern())
    }
}

/// A resolved location: the route plus its path and query parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteMatch {
    pub route: Route,
    pub params: BTreeMap<String, String>,
}

impl RouteMatch {
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    pub fn eid(&self) -> Option<Eid> {
        self.param("eid").and_then(|eid| eid.parse().ok())
    }

    /// Entity designated by the `eid` and `cw_etype` parameters.
    pub fn entity_ref(&self) -> Option<EntityRef> {
        Some(EntityRef::new(self.eid()?, self.param("cw_etype")?))
    }
}

/// Match `path` against one pattern. Patterns match on a segment boundary;
/// a `:name` placeholder captures the rest of its segment.
fn match_pattern(pattern: &str, path: &str) -> Option<Option<(String, String)>> {
    match pattern.split_once(':') {
        Some((prefix, name)) => {
            let rest = path.strip_prefix(prefix)?;
            let value = rest.split('/').next().unwrap_or_default();
            if value.is_empty() {
                return None;
            }
            Some(Some((name.to_string(), value.to_string())))
        }
        None => {
            let rest = path.strip_prefix(pattern)?;
            if rest.is_empty() || rest.starts_with('/') {
                Some(None)
            } else {
                None
            }
        }
    }
}

/// Resolve a location (`/tree?eid=42` or an absolute URL) to a route.
pub fn resolve(location: &str) -> ApiResult<Option<RouteMatch>> {
    let base = Url::parse("http://localhost/").map_err(|e| ApiError::InvalidUrl(e.to_string()))?;
    let url = base
        .join(location)
        .map_err(|e| ApiError::InvalidUrl(format!("{}: {}", location, e)))?;
    let path = url.path().trim_end_matches('/');

    for (pattern, route) in ROUTES {
        let Some(captured) = match_pattern(pattern, path) else {
            continue;
        };
        let mut params: BTreeMap<String, String> = url.query_pairs().into_owned().collect();
        params.extend(captured);
        return Ok(Some(RouteMatch { route: *route, params }));
    }
    log::debug!("no route for {}", location);
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn route(location: &str) -> Option<Route> {
        resolve(location).unwrap().map(|found| found.route)
    }

    #[test]
    fn test_segment_boundaries() {
        assert_eq!(route("/add"), Some(Route::Add));
        assert_eq!(route("/add/"), Some(Route::Add));
        assert_eq!(route("/add-service"), Some(Route::AddService));
        assert_eq!(route("/add-user?x=1"), Some(Route::AddUser));
        assert_eq!(route("/edit"), Some(Route::Edit));
        assert_eq!(route("/edit-index"), Some(Route::EditIndex));
        assert_eq!(route("/editrelated"), Some(Route::EditRelated));
        assert_eq!(route("/tree/42"), Some(Route::Tree));
        assert_eq!(route("/unknown"), None);
        assert_eq!(route("/"), None);
    }

    #[test]
    fn test_query_and_path_params() {
        let found = resolve("/editrelated?name=same_as&eid=42&cw_etype=Section").unwrap().unwrap();
        assert_eq!(found.param("name"), Some("same_as"));
        assert_eq!(found.entity_ref(), Some(EntityRef::new(42, "Section")));

        let found = resolve("http://cms.test/translate_en?eid=3").unwrap().unwrap();
        assert_eq!(found.route, Route::Translate);
        assert_eq!(found.param("language"), Some("en"));
        assert_eq!(found.eid(), Some(3));
        assert_eq!(route("/translate_"), None);
    }

    #[test]
    fn test_authority_target_types() {
        assert_eq!(Route::EditAgentAuthority.target_type(), Some("AgentAuthority"));
        assert_eq!(Route::Tree.target_type(), None);
        assert_eq!(Route::SectionThemes.to_string(), "/section-themes");
    }
}
