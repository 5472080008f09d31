use crate::errors::{HarnessError, HarnessResult};
use crate::scenario;
use console::style;

pub fn handle(id: &str) -> HarnessResult<()> {
    let registry = scenario::builtin()?;
    let s = registry
        .find(id)
        .ok_or_else(|| HarnessError::UnknownScenario(id.to_owned()))?;

    println!("{}", style(&s.id).blue().bold().underlined());
    println!("  {:12} {}", style("Category"), style(s.category).cyan());
    println!("  {:12} {}", style("Description"), s.description);
    println!("  {:12} {:?}", style("Benign"), s.benign_input);
    println!("  {:12} {:?}", style("Malicious"), s.malicious_input);

    Ok(())
}
