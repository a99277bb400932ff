//! Wire models for the Microsoft Graph resources this tool touches

use serde::Deserialize;

/// Generic OData collection envelope: `{ "value": [...] }`
#[derive(Debug, Clone, Deserialize)]
pub struct ListResponse<T> {
    #[serde(default = "Vec::new")]
    pub value: Vec<T>,
}

/// A user returned by the directory (`/users` queries)
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DirectoryUser {
    pub id: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub mail: Option<String>,
    #[serde(default)]
    pub user_principal_name: Option<String>,
}

/// A team or unified group the signed-in user belongs to
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupRef {
    pub id: String,
    #[serde(default)]
    pub display_name: Option<String>,
}

/// A Planner plan as returned by `/groups/{id}/planner/plans`
#[derive(Debug, Clone, Deserialize)]
pub struct Plan {
    pub id: String,
    pub title: String,
}

/// A plan annotated with the group it was found under
#[derive(Debug, Clone)]
pub struct PlanSummary {
    pub id: String,
    pub title: String,
    pub group_id: String,
    pub group_name: String,
}

impl PlanSummary {
    /// Display form used in listings: `Title (Group)`
    pub fn qualified_title(&self) -> String {
        format!("{} ({})", self.title, self.group_name)
    }
}

/// A bucket within a plan
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Bucket {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub plan_id: Option<String>,
}

impl Bucket {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Bucket {
            id: id.into(),
            name: name.into(),
            plan_id: None,
        }
    }
}

/// The subset of a created Planner task we care about
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlannerTask {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub plan_id: Option<String>,
    #[serde(default)]
    pub bucket_id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_response_missing_value() {
        let parsed: ListResponse<DirectoryUser> = serde_json::from_str("{}").unwrap();
        assert!(parsed.value.is_empty());
    }

    #[test]
    fn test_directory_user_camel_case() {
        let json = r#"{
            "id": "abc",
            "displayName": "Jane Doe",
            "mail": "jane@example.com",
            "userPrincipalName": "jane@example.com"
        }"#;
        let user: DirectoryUser = serde_json::from_str(json).unwrap();
        assert_eq!(user.display_name, "Jane Doe");
        assert_eq!(user.mail.as_deref(), Some("jane@example.com"));
    }

    #[test]
    fn test_plan_summary_qualified_title() {
        let plan = PlanSummary {
            id: "p1".into(),
            title: "Roadmap".into(),
            group_id: "g1".into(),
            group_name: "Engineering".into(),
        };
        assert_eq!(plan.qualified_title(), "Roadmap (Engineering)");
    }
}
