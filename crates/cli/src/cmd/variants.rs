use anyhow::Result;

use pybundle_lib::BuilderSpec;
use pybundle_lib::build::PRESETS;

use crate::output::{OutputFormat, print_json, symbols};

pub fn cmd_variants(format: OutputFormat) -> Result<()> {
  let specs = PRESETS
    .iter()
    .map(|(name, description)| BuilderSpec::preset(name).map(|spec| (spec, *description)))
    .collect::<Result<Vec<_>, _>>()?;

  if format.is_json() {
    let items: Vec<_> = specs
      .iter()
      .map(|(spec, description)| {
        serde_json::json!({
          "name": spec.name,
          "variant": spec.variant,
          "version": spec.version,
          "depends_on": spec.depends_on,
          "description": description,
        })
      })
      .collect();
    return print_json(&items);
  }

  for (spec, description) in &specs {
    println!(
      "{:<18} {} {} {} ({})",
      spec.name,
      symbols::ARROW,
      spec.variant,
      spec.version,
      description
    );
  }
  Ok(())
}
