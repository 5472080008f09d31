use crate::errors::HarnessResult;
use crate::scenario;
use console::style;

pub fn handle(verbose: bool) -> HarnessResult<()> {
    let registry = scenario::builtin()?;

    println!("{}", style("Registered scenarios").blue().bold().underlined());

    for s in registry.all() {
        println!(
            "  {}  [{}]",
            style(&s.id).white().bold(),
            style(s.category).cyan()
        );

        if verbose {
            println!("    {:12} {}", style("Description"), s.description);
            println!("    {:12} {:?}", style("Benign"), s.benign_input);
            println!("    {:12} {:?}", style("Malicious"), s.malicious_input);
        }
    }

    Ok(())
}
