//! Structured search query text.
//!
//! Values are interpolated between single quotes, so anything that could
//! close the literal is refused rather than escaped.

use super::SearchError;

pub const ALL_RESOURCES: &str = "all";

pub fn validate_query_value(field: &'static str, value: &str) -> Result<(), SearchError> {
    let invalid = value.is_empty()
        || value
            .chars()
            .any(|c| c == '\'' || c == '\\' || c.is_control());

    if invalid {
        return Err(SearchError::InvalidQueryValue { field });
    }
    Ok(())
}

/// Live resources of `resource_type` whose ownership tag equals `user`.
pub fn owned_resources_query(
    resource_type: &str,
    namespace: &str,
    key: &str,
    user: &str,
) -> Result<String, SearchError> {
    validate_query_value("resource_type", resource_type)?;
    validate_query_value("tag_namespace", namespace)?;
    validate_query_value("tag_key", key)?;
    validate_query_value("user", user)?;

    if resource_type.chars().any(char::is_whitespace) {
        return Err(SearchError::InvalidQueryValue {
            field: "resource_type",
        });
    }

    Ok(format!(
        "query {} resources where definedTags.namespace = '{}' && definedTags.key = '{}' && definedTags.value = '{}' && lifeCycleState != 'TERMINATED' && lifeCycleState != 'TERMINATING'",
        resource_type, namespace, key, user
    ))
}

/// Resources of `resource_type` in any of `compartments`.
pub fn compartments_query<S: AsRef<str>>(
    resource_type: &str,
    compartments: &[S],
) -> Result<String, SearchError> {
    validate_query_value("resource_type", resource_type)?;
    if compartments.is_empty() {
        return Err(SearchError::InvalidQueryValue {
            field: "compartments",
        });
    }

    let clauses = compartments
        .iter()
        .map(|compartment| {
            let compartment = compartment.as_ref();
            validate_query_value("compartments", compartment)?;
            Ok(format!("compartmentId = '{}'", compartment))
        })
        .collect::<Result<Vec<_>, SearchError>>()?;

    Ok(format!(
        "query {} resources where {}",
        resource_type,
        clauses.join(" || ")
    ))
}

pub fn identifier_query(identifier: &str) -> Result<String, SearchError> {
    validate_query_value("identifier", identifier)?;
    Ok(format!(
        "query all resources where identifier = '{}'",
        identifier
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_ownership_query() {
        let query = owned_resources_query("instance", "Owner", "Creator", "alice").unwrap();

        assert_eq!(
            query,
            "query instance resources where definedTags.namespace = 'Owner' && definedTags.key = 'Creator' && definedTags.value = 'alice' && lifeCycleState != 'TERMINATED' && lifeCycleState != 'TERMINATING'"
        );
    }

    #[test]
    fn rejects_values_that_escape_the_literal() {
        for user in ["a' || definedTags.value = 'b", "a\\", "line\nbreak", ""] {
            assert!(matches!(
                owned_resources_query("all", "Owner", "Creator", user),
                Err(SearchError::InvalidQueryValue { field: "user" })
            ));
        }
    }

    #[test]
    fn rejects_resource_type_with_spaces() {
        assert!(owned_resources_query("all resources where", "Owner", "Creator", "alice").is_err());
    }

    #[test]
    fn builds_compartment_query() {
        let query = compartments_query(
            "volume",
            &["ocid1.compartment.oc1..a", "ocid1.compartment.oc1..b"],
        )
        .unwrap();

        assert_eq!(
            query,
            "query volume resources where compartmentId = 'ocid1.compartment.oc1..a' || compartmentId = 'ocid1.compartment.oc1..b'"
        );
    }

    #[test]
    fn compartment_query_needs_valid_compartments() {
        let none: [&str; 0] = [];
        assert!(matches!(
            compartments_query(ALL_RESOURCES, &none),
            Err(SearchError::InvalidQueryValue { field: "compartments" })
        ));
        assert!(compartments_query(ALL_RESOURCES, &["ok", "x' || 'y"]).is_err());
    }

    #[test]
    fn builds_identifier_query() {
        assert_eq!(
            identifier_query("ocid1.instance.oc1..a").unwrap(),
            "query all resources where identifier = 'ocid1.instance.oc1..a'"
        );
        assert!(identifier_query("x' || 'y").is_err());
    }
}
