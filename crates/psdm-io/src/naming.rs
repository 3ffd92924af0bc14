//! File naming of the per-kind input files.
//!
//! Every kind lives in its own file named after the entity, e.g.
//! `node_input.csv` or `transformer_3_w_input.json`.

use psdm_core::EntityKind;

/// File stem (without extension) holding the records of a kind.
pub fn file_stem(kind: EntityKind) -> &'static str {
    match kind {
        EntityKind::Node => "node_input",
        EntityKind::Line => "line_input",
        EntityKind::Switch => "switch_input",
        EntityKind::Transformer2W => "transformer_2_w_input",
        EntityKind::Transformer3W => "transformer_3_w_input",
        EntityKind::NodeGraphic => "node_graphic_input",
        EntityKind::LineGraphic => "line_graphic_input",
    }
}

/// Kind stored under a file stem.
pub fn kind_for_stem(stem: &str) -> Option<EntityKind> {
    EntityKind::ALL
        .into_iter()
        .find(|kind| file_stem(*kind).eq_ignore_ascii_case(stem))
}

/// Full file name of a kind for the given extension.
pub fn file_name(kind: EntityKind, extension: &str) -> String {
    format!("{}.{extension}", file_stem(kind))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stems_round_trip() {
        for kind in EntityKind::ALL {
            assert_eq!(kind_for_stem(file_stem(kind)), Some(kind));
        }
        assert_eq!(kind_for_stem("load_input"), None);
    }

    #[test]
    fn test_file_name() {
        assert_eq!(
            file_name(EntityKind::Transformer2W, "csv"),
            "transformer_2_w_input.csv"
        );
    }
}
