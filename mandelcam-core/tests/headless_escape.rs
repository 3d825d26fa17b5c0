use mandelcam_core::{EscapeTime, Julia, Mandelbrot, ViewHistory, ViewParameters, ZoomTransform, IN_SET};

/// Escape every pixel of a view and collect results into a flat Vec.
fn escape_grid<F: EscapeTime>(fractal: &F, view: &ViewParameters, w: u32, h: u32) -> Vec<i32> {
    let mut results = Vec::with_capacity((w * h) as usize);
    for py in 0..h {
        for px in 0..w {
            let c = view.pixel_to_complex(w, h, px as f64 + 0.5, py as f64 + 0.5);
            results.push(fractal.escape(c, view.max_passes()));
        }
    }
    results
}

#[test]
fn headless_mandelbrot_grid() {
    let view = ViewParameters::new(-2.0, 1.0, -1.5, 1.5, 100, 1).unwrap();
    let results = escape_grid(&Mandelbrot, &view, 100, 100);

    assert_eq!(results.len(), 100 * 100);
    let interior = results.iter().filter(|&&n| n == IN_SET).count();
    let escaped = results.iter().filter(|&&n| n > 0).count();
    assert!(interior > 0, "should have some interior points");
    assert!(escaped > 0, "should have some escaped points");
    assert_eq!(interior + escaped, 10_000);
}

#[test]
fn headless_julia_grid() {
    let view = ViewParameters::default_julia();
    let results = escape_grid(&Julia::default(), &view, 80, 80);
    assert!(results.iter().any(|&n| n == IN_SET));
    assert!(results.iter().any(|&n| n > 0));
}

#[test]
fn zoom_session_with_history() {
    let zt = ZoomTransform::default();
    let mut history = ViewHistory::default();
    let mut view = ViewParameters::default_mandelbrot();
    history.push(view);

    // Three clicks zooming in towards the seahorse valley.
    for _ in 0..3 {
        let (px, py) = view.complex_to_pixel(
            400,
            300,
            mandelcam_core::Complex::new(-0.75, 0.1),
        );
        view = zt.zoom(&view, 400, 300, px, py, 0.5).unwrap();
        history.push(view);
    }
    assert!(view.max_passes() > ViewParameters::DEFAULT_MAX_PASSES);
    assert!((view.center().re + 0.75).abs() < 1e-9);

    let back = history.undo().unwrap();
    assert!(back.real_span() > view.real_span());
    assert_eq!(history.redo(), Some(view));
}
