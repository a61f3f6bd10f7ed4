//! Basic usage example - draw faces and predict their emotions

use learning_machine::{MachineContext, Result};

fn main() -> Result<()> {
    // Get path from args or use current directory
    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "./lm-data".to_string());

    println!("Initializing MachineContext with data root: {}", path);

    let mut context = MachineContext::builder(&path)
        .auto_create_dirs(true)
        .build()?;
    context.machine().write_initial_weights(0)?;

    println!("Drawing faces...");
    let (sampler, machine) = context.parts_mut();
    let faces = sampler.sample_random(5)?;
    let predictions = machine.predict(&faces, true)?;

    for (face, row) in faces.iter().zip(&predictions) {
        let best = row
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, _)| sampler.classes()[i].as_str())
            .unwrap_or("?");
        println!(
            "  - {} (stored: {}, predicted: {})",
            face.token(sampler.codec()),
            sampler.classes()[face.label],
            best
        );
    }

    context.persist()
}
