//! Identifier derivation for environments and cell metrics.
//!
//! Measuring ids follow the form `cells/<envID>/cell/<behaviorTypeIdent>`,
//! where the behavior type ident is derived from the behavior's Rust type
//! name with non-identifier characters mapped to underscores.

use uuid::Uuid;

/// Generates a fresh environment id.
pub(crate) fn new_env_id() -> String {
    Uuid::new_v4().to_string()
}

/// Derives a normalized identifier part from a type.
///
/// Takes the last path segment of the type name, drops generic parameters,
/// and maps anything outside `[A-Za-z0-9_]` to `_`.
pub(crate) fn type_ident<T: ?Sized>() -> String {
    let name = std::any::type_name::<T>();
    let base = name.split('<').next().unwrap_or(name);
    let short = base.rsplit("::").next().unwrap_or(base);
    short
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect()
}

/// Measuring id of a single cell.
pub(crate) fn measuring_id(env_id: &str, behavior_ident: &str) -> String {
    format!("cells/{env_id}/cell/{behavior_ident}")
}

/// Counter id for the total number of live cells in an environment.
pub(crate) fn total_cells_id(env_id: &str) -> String {
    format!("cells/{env_id}/total-cells")
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EchoBehavior;
    struct Wrapped<T>(T);

    #[test]
    fn type_ident_uses_last_segment() {
        assert_eq!(type_ident::<EchoBehavior>(), "EchoBehavior");
    }

    #[test]
    fn type_ident_strips_generics() {
        assert_eq!(type_ident::<Wrapped<EchoBehavior>>(), "Wrapped");
    }

    #[test]
    fn type_ident_normalizes_non_identifier_chars() {
        assert_eq!(type_ident::<(u8, u8)>(), "_u8__u8_");
    }

    #[test]
    fn measuring_ids_follow_the_documented_form() {
        assert_eq!(
            measuring_id("env-1", "EchoBehavior"),
            "cells/env-1/cell/EchoBehavior"
        );
        assert_eq!(total_cells_id("env-1"), "cells/env-1/total-cells");
    }

    #[test]
    fn env_ids_are_unique() {
        assert_ne!(new_env_id(), new_env_id());
    }
}
