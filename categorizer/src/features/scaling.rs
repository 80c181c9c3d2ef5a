use ndarray::{Array1, Array2, Axis, Zip};

/// Zero mean, unit variance per column. Constant columns become all zeros.
pub fn standardize(data: &Array2<f64>) -> Array2<f64> {
    if data.nrows() == 0 {
        return data.clone();
    }
    let mean = data
        .mean_axis(Axis(0))
        .unwrap_or_else(|| Array1::zeros(data.ncols()));
    let std = data.std_axis(Axis(0), 0.0);

    let mut scaled = data - &mean;
    Zip::from(scaled.columns_mut())
        .and(&std)
        .for_each(|mut column, &s| {
            if s > f64::EPSILON {
                column.mapv_inplace(|x| x / s);
            } else {
                column.fill(0.0);
            }
        });
    scaled
}
