//! Plot the joystick transfer curve for a few speed levels
//!
//! The magnet is swept along one axis and the resulting output is plotted against the raw field reading, showing the
//! inner deadzone, the stretched band, and the saturation at the rim.
//!
//! Look in /images/ for the resulting plot.
//!
//! Requires plotters lib: https://docs.rs/plotters/latest/plotters/.

use plotters::prelude::*;
use sip_puff_input::joystick::{Joystick, OutputMode};
use sip_puff_input::point::PointF;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // raw field sweep in millitesla, past the factory corners on both sides
    const SWEEP_MT: f32 = 18.0;
    const STEP_MT: f32 = 0.2;
    let num_points = (2.0 * SWEEP_MT / STEP_MT) as usize;

    let sweep = || (0..=num_points).map(|i| -SWEEP_MT + i as f32 * STEP_MT);

    let root =
        BitMapBackend::new("images/joystick_transfer_plot.png", (640, 480)).into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .caption("Joystick transfer", ("Arial", 20).into_font())
        .x_label_area_size(40)
        .y_label_area_size(40)
        .build_cartesian_2d(-SWEEP_MT..SWEEP_MT, -20f32..20f32)?;

    chart
        .configure_mesh()
        .x_desc("Raw field (mT)")
        .y_desc("Output")
        .draw()?;

    for (speed_level, color) in [(1, BLUE), (5, GREEN), (10, RED)] {
        let mut joystick = Joystick::new();
        joystick.set_output_mode(OutputMode::Cursor);
        joystick.set_speed_level(speed_level);

        chart
            .draw_series(LineSeries::new(
                sweep().map(|raw| {
                    joystick.update(PointF::new(raw, 0.0));
                    (raw, joystick.output().x as f32)
                }),
                color,
            ))?
            .label(format!("Speed level {}", speed_level))
            .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color));
    }

    chart
        .configure_series_labels()
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()?;

    root.present()?;

    Ok(())
}
