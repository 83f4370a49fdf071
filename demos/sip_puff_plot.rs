//! Plot a simulated breath pressure signal and the sip/puff states detected from it
//!
//! Look in /images/ for the resulting plot.
//!
//! Requires plotters lib: https://docs.rs/plotters/latest/plotters/.

use plotters::prelude::*;
use sip_puff_input::classifier::Phase;
use sip_puff_input::pressure::Pressure;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    const POLL_MS: u32 = 50;
    const NUM_SECS_TO_PLOT: u32 = 4;
    const NUM_POINTS: usize = (NUM_SECS_TO_PLOT * 1_000 / POLL_MS) as usize;
    const AMBIENT_HPA: f32 = 1013.25;

    // init the simulated mouthpiece to the ambient pressure
    let mut mouthpiece = [AMBIENT_HPA; NUM_POINTS];
    // a short sip
    mouthpiece[10..24]
        .iter_mut()
        .enumerate()
        .for_each(|(i, hpa)| *hpa -= f32::sin(core::f32::consts::PI * i as f32 / 14.0) * 6.0);
    // a weak puff that never crosses the threshold
    mouthpiece[34..40].iter_mut().for_each(|hpa| *hpa += 2.0);
    // a long puff
    mouthpiece[50..72]
        .iter_mut()
        .enumerate()
        .for_each(|(i, hpa)| *hpa += f32::sin(core::f32::consts::PI * i as f32 / 22.0) * 8.0);

    let mut pressure = Pressure::new(0);

    let root = BitMapBackend::new("images/sip_puff_plot.png", (640, 480)).into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .caption("Sip and puff", ("Arial", 20).into_font())
        .x_label_area_size(40)
        .y_label_area_size(40)
        .build_cartesian_2d(0f32..NUM_SECS_TO_PLOT as f32, -10f32..10f32)?;

    chart
        .configure_mesh()
        .x_desc("Time (s)")
        .y_desc("Pressure (hPa)")
        .draw()?;

    let mut differential = Vec::with_capacity(NUM_POINTS);
    let mut detected = Vec::with_capacity(NUM_POINTS);

    for (i, &hpa) in mouthpiece.iter().enumerate() {
        let now_ms = i as u32 * POLL_MS;
        pressure.ingest(hpa, Some(AMBIENT_HPA));
        pressure.classify(now_ms);

        let t = now_ms as f32 / 1_000.0;
        differential.push((t, pressure.differential()));

        // sips plot as -5, puffs as +5
        let state = pressure.state();
        let level = match (state.phase, state.main_state) {
            (Phase::Started, 1) => -5.0,
            (Phase::Started, 2) => 5.0,
            _ => 0.0,
        };
        detected.push((t, level));
    }

    // plot the breath pressure in blue
    chart
        .draw_series(LineSeries::new(differential, BLUE))?
        .label("Breath pressure")
        .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], BLUE));

    // plot the thresholds in grey
    for threshold in [-pressure.sip_threshold(), pressure.puff_threshold()] {
        chart.draw_series(LineSeries::new(
            [(0.0, threshold), (NUM_SECS_TO_PLOT as f32, threshold)],
            BLACK.mix(0.3),
        ))?;
    }

    // plot the detected state in red
    chart
        .draw_series(LineSeries::new(detected, RED))?
        .label("Detected state")
        .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], RED));

    chart
        .configure_series_labels()
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()?;

    root.present()?;

    Ok(())
}
