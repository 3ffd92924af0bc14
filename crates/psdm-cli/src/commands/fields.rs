use std::io::{self, Write};

use anyhow::Result;
use psdm_core::factory::field_sets;
use psdm_core::EntityKind;
use tabwriter::TabWriter;

/// Print the accepted field-set variants of `kind`, most specific first.
pub fn handle(kind: EntityKind) -> Result<()> {
    let spec = field_sets(kind);
    println!("Field sets for {} ({}):", kind.entity_name(), kind);
    let mut writer = TabWriter::new(io::stdout());
    writeln!(writer, "Variant\tFields")?;
    for (index, variant) in spec.variants().iter().enumerate() {
        writeln!(writer, "{}\t{}", index + 1, variant.names().join(", "))?;
    }
    writer.flush()?;
    Ok(())
}
