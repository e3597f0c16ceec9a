//! Immutability matrix engine.
//!
//! A resource declares its update rules as a table of [`Rule`]s relative to a
//! subtree (usually `spec`). Both sides are compared in serialized form so the
//! table stays declarative; every rule produces at most one error at its own
//! path no matter how many leaves beneath it changed.

use serde_json::Value;

use super::diff::FieldDiff;
use super::field::{ErrorList, FieldError, FieldPath};

/// How a field may change across updates.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mutability {
    /// Any change is rejected.
    Immutable,
    /// May go from zero to a value; never from a value to anything else.
    ImmutableOnceSet,
}

/// One row of an immutability matrix.
#[derive(Clone, Copy, Debug)]
pub struct Rule {
    /// Dotted path relative to the table root (e.g. `controlPlaneEndpoint.host`).
    pub path: &'static str,
    pub class: Mutability,
}

impl Rule {
    pub const fn immutable(path: &'static str) -> Self {
        Self {
            path,
            class: Mutability::Immutable,
        }
    }

    pub const fn once_set(path: &'static str) -> Self {
        Self {
            path,
            class: Mutability::ImmutableOnceSet,
        }
    }
}

static NULL: Value = Value::Null;

/// Resolve a dotted path inside a JSON document. Missing keys resolve to null.
pub fn lookup<'a>(value: &'a Value, path: &str) -> &'a Value {
    path.split('.')
        .filter(|segment| !segment.is_empty())
        .try_fold(value, |current, segment| current.get(segment))
        .unwrap_or(&NULL)
}

/// Whether a serialized value is the zero value of its type.
pub fn is_zero(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.values().all(is_zero),
    }
}

/// Evaluate a single rule.
pub fn check_rule(old: &Value, new: &Value, root: &FieldPath, rule: &Rule) -> Option<FieldError> {
    let before = lookup(old, rule.path);
    let after = lookup(new, rule.path);
    let path = root.child(rule.path);

    if FieldDiff::from_values(before, after, &path).is_empty() {
        return None;
    }

    match rule.class {
        Mutability::Immutable => Some(FieldError::forbidden(&path, "field is immutable")),
        Mutability::ImmutableOnceSet if is_zero(before) => None,
        Mutability::ImmutableOnceSet => {
            Some(FieldError::forbidden(&path, "field is immutable once set"))
        }
    }
}

/// Evaluate every rule of a matrix.
pub fn check(old: &Value, new: &Value, root: &FieldPath, rules: &[Rule]) -> ErrorList {
    rules
        .iter()
        .filter_map(|rule| check_rule(old, new, root, rule))
        .collect()
}

const SUBNET_NAME: &str = "subnetName";
const ACCELERATED_NETWORKING: &str = "acceleratedNetworking";
const NETWORK_INTERFACES: &str = "networkInterfaces";

/// Paths covered by [`network_interfaces`], relative to the machine spec.
pub const NETWORK_INTERFACE_PATHS: &[&str] = &[SUBNET_NAME, ACCELERATED_NETWORKING, NETWORK_INTERFACES];

/// Network interfaces and the legacy single-interface fields follow `class`,
/// except for moving the legacy fields into a single interface which is
/// always accepted. With [`Mutability::ImmutableOnceSet`] a first assignment
/// onto all-empty fields is accepted too.
///
/// `old` and `new` are machine specs in serialized form.
pub fn network_interfaces(old: &Value, new: &Value, root: &FieldPath, class: Mutability) -> ErrorList {
    let mut errors = ErrorList::new();

    let changed = |field: &str| {
        !FieldDiff::from_values(lookup(old, field), lookup(new, field), &root.child(field)).is_empty()
    };
    let legacy_changed = changed(SUBNET_NAME) || changed(ACCELERATED_NETWORKING);
    let interfaces_changed = changed(NETWORK_INTERFACES);

    if !legacy_changed && !interfaces_changed {
        return errors;
    }
    if is_migration(old, new) {
        return errors;
    }
    let old_unset = NETWORK_INTERFACE_PATHS
        .iter()
        .all(|field| is_zero(lookup(old, field)));
    if class == Mutability::ImmutableOnceSet && old_unset {
        return errors;
    }

    if interfaces_changed {
        errors.push(FieldError::forbidden(
            &root.child(NETWORK_INTERFACES),
            "network interfaces are immutable",
        ));
    }
    if changed(SUBNET_NAME) {
        errors.push(FieldError::forbidden(
            &root.child(SUBNET_NAME),
            "field is immutable",
        ));
    }
    if changed(ACCELERATED_NETWORKING) {
        errors.push(FieldError::forbidden(
            &root.child(ACCELERATED_NETWORKING),
            "field is immutable",
        ));
    }
    errors
}

/// `{subnetName: X, acceleratedNetworking: Y, networkInterfaces: []}` to
/// `{subnetName: "", acceleratedNetworking: nil, networkInterfaces: [{X, Y, 1}]}`.
fn is_migration(old: &Value, new: &Value) -> bool {
    let old_subnet = lookup(old, SUBNET_NAME);
    let old_accel = lookup(old, ACCELERATED_NETWORKING);

    let legacy_moved = !is_zero(old_subnet)
        && is_zero(lookup(old, NETWORK_INTERFACES))
        && is_zero(lookup(new, SUBNET_NAME))
        && lookup(new, ACCELERATED_NETWORKING).is_null();
    if !legacy_moved {
        return false;
    }

    match lookup(new, NETWORK_INTERFACES).as_array().map(Vec::as_slice) {
        Some([only]) => {
            lookup(only, SUBNET_NAME) == old_subnet
                && lookup(only, ACCELERATED_NETWORKING) == old_accel
                && lookup(only, "privateIPConfigs").as_i64() == Some(1)
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn spec() -> FieldPath {
        FieldPath::new("spec")
    }

    #[test]
    fn test_lookup() {
        let doc = json!({"a": {"b": 3}});
        assert_eq!(lookup(&doc, "a.b"), &json!(3));
        assert!(lookup(&doc, "a.c").is_null());
        assert_eq!(lookup(&doc, ""), &doc);
    }

    #[test]
    fn test_is_zero() {
        assert!(is_zero(&json!(null)));
        assert!(is_zero(&json!("")));
        assert!(is_zero(&json!(0)));
        assert!(is_zero(&json!({"host": "", "port": 0})));
        assert!(!is_zero(&json!({"host": "h", "port": 0})));
        assert!(!is_zero(&json!(true)));
    }

    #[test]
    fn test_once_set_allows_first_assignment() {
        let rules = [Rule::once_set("location")];
        let errs = check(&json!({}), &json!({"location": "eastus"}), &spec(), &rules);
        assert!(errs.is_empty());

        let errs = check(
            &json!({"location": "eastus"}),
            &json!({"location": "westus"}),
            &spec(),
            &rules,
        );
        assert_eq!(errs.len(), 1);
        assert!(errs.has_path("spec.location"));

        let errs = check(&json!({"location": "eastus"}), &json!({}), &spec(), &rules);
        assert_eq!(errs.len(), 1);
    }

    #[test]
    fn test_immutable_rejects_first_assignment() {
        let rules = [Rule::immutable("vmSize")];
        let errs = check(&json!({}), &json!({"vmSize": "Standard_D2s_v3"}), &spec(), &rules);
        assert_eq!(errs.len(), 1);
    }

    #[test]
    fn test_one_error_per_subtree() {
        let rules = [Rule::once_set("virtualNetwork")];
        let errs = check(
            &json!({"virtualNetwork": {"name": "a", "cidrBlock": "10.0.0.0/8"}}),
            &json!({"virtualNetwork": {"name": "b", "cidrBlock": "10.0.0.0/16"}}),
            &spec(),
            &rules,
        );
        assert_eq!(errs.len(), 1);
        assert!(errs.has_path("spec.virtualNetwork"));
    }

    #[test]
    fn test_network_interface_migration_allowed() {
        let old = json!({"subnetName": "subnet1", "acceleratedNetworking": true});
        let new = json!({
            "networkInterfaces": [
                {"subnetName": "subnet1", "acceleratedNetworking": true, "privateIPConfigs": 1}
            ]
        });
        assert!(network_interfaces(&old, &new, &spec(), Mutability::ImmutableOnceSet).is_empty());
    }

    #[test]
    fn test_network_interface_migration_must_preserve_values() {
        let old = json!({"subnetName": "subnet1", "acceleratedNetworking": true});
        let new = json!({
            "networkInterfaces": [
                {"subnetName": "subnet2", "acceleratedNetworking": true, "privateIPConfigs": 1}
            ]
        });
        let errs = network_interfaces(&old, &new, &spec(), Mutability::ImmutableOnceSet);
        assert!(errs.has_path("spec.networkInterfaces"));
    }

    #[test]
    fn test_network_interface_modification_rejected() {
        let old = json!({"networkInterfaces": [{"subnetName": "a", "privateIPConfigs": 1}]});
        let new = json!({"networkInterfaces": [{"subnetName": "b", "privateIPConfigs": 1}]});
        let errs = network_interfaces(&old, &new, &spec(), Mutability::ImmutableOnceSet);
        assert_eq!(errs.len(), 1);
        assert!(errs.has_path("spec.networkInterfaces"));
    }

    #[test]
    fn test_network_interfaces_first_assignment_allowed() {
        let new = json!({"networkInterfaces": [{"subnetName": "a", "privateIPConfigs": 1}]});
        assert!(network_interfaces(&json!({}), &new, &spec(), Mutability::ImmutableOnceSet).is_empty());
    }

    #[test]
    fn test_network_interfaces_first_assignment_rejected_when_immutable() {
        let new = json!({
            "subnetName": "x",
            "networkInterfaces": [{"subnetName": "a", "privateIPConfigs": 1}]
        });
        let errs = network_interfaces(&json!({}), &new, &spec(), Mutability::Immutable);
        assert!(errs.has_path("spec.networkInterfaces"));
        assert!(errs.has_path("spec.subnetName"));
    }

    #[test]
    fn test_network_interface_migration_allowed_when_immutable() {
        let old = json!({"subnetName": "subnet1"});
        let new = json!({"networkInterfaces": [{"subnetName": "subnet1", "privateIPConfigs": 1}]});
        assert!(network_interfaces(&old, &new, &spec(), Mutability::Immutable).is_empty());
    }
}
