//! Solves the worked two-bar truss and maps its design space.
//!
//! Prints `Height:`, `Diameter:` and `Weight:` to stdout, then writes the
//! overview and detail contour plots as SVG files (`contour1.svg`,
//! `contour2.svg` unless the run configuration names others).

use std::error::Error;
use std::process::ExitCode;

use twobar::render::{ContourRenderer, SvgRenderer, detail_plot, overview_plot};
use twobar::{RunConfig, SolveStatus, build_model, evaluate_grid};

fn run() -> Result<(), Box<dyn Error>> {
    let config = RunConfig::load()?;
    let verbose = config.solver.verbose;

    let mut model = build_model(&config.truss, &config.design)?;
    let result = model.solve(&config.solver)?;
    if result.status != SolveStatus::Converged {
        return Err(format!("solver finished with status {}: {}", result.status, result.message).into());
    }

    let height = model.value("height").ok_or("model has no height variable")?;
    let diameter = model.value("diameter").ok_or("model has no diameter variable")?;
    println!("Height: {height}");
    println!("Diameter: {diameter}");
    println!("Weight: {}", result.objective_value);

    let grid = evaluate_grid(
        &config.grid.height.values(),
        &config.grid.diameter.values(),
        &config.truss,
    );
    if verbose {
        eprintln!(
            "✓ Evaluated {} x {} grid",
            grid.y_values.len(),
            grid.x_values.len()
        );
    }

    let limits = &config.design.limits;
    let renderer = SvgRenderer::default();
    for (plot, path) in [
        (overview_plot(limits.max_stress, limits.max_deflection), &config.output.overview),
        (detail_plot(limits.max_stress, limits.max_deflection), &config.output.detail),
    ] {
        renderer.render(&plot, &grid, path)?;
        if verbose {
            eprintln!("✓ Wrote {}", path.display());
        }
    }

    Ok(())
}

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}
