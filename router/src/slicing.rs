use rand::Rng;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

/// Split `total_qty` into `target_slices` lot-aligned pieces, rounding every slice down to a
/// multiple of `lot_size` and folding the remainder into the final slice. Shared by
/// ICEBERG/TWAP/VWAP slice construction.
pub fn calculate_optimal_slice_size(total_qty: u64, lot_size: u64, target_slices: usize) -> Vec<u64> {
    if target_slices == 0 || total_qty == 0 {
        return Vec::new();
    }
    let lot_size = lot_size.max(1);
    let lots_total = total_qty / lot_size;
    if lots_total == 0 {
        return Vec::new();
    }
    let slices = target_slices.min(lots_total as usize).max(1);
    let lots_per_slice = lots_total / slices as u64;
    let mut result = vec![lots_per_slice * lot_size; slices];
    let allocated: u64 = result.iter().sum();
    if let Some(last) = result.last_mut() {
        *last += total_qty - allocated;
    }
    result.into_iter().filter(|&q| q > 0).collect()
}

/// Equal-sized ICEBERG slices (ten parts), reusing [`calculate_optimal_slice_size`].
pub fn iceberg_slices(total_qty: u64, lot_size: u64) -> Vec<u64> {
    calculate_optimal_slice_size(total_qty, lot_size, 10)
}

/// Randomised time-weighted slice quantities summing to `total_quantity`, rounded down to lot
/// multiples with the remainder folded into the final slice.
pub fn twap_slices<R: Rng>(total_quantity: u64, lot_size: u64, slices: usize, randomness: f64, rng: &mut R) -> Vec<u64> {
    weighted_slices(total_quantity, lot_size, &vec![1.0; slices.max(1)], randomness, rng)
}

/// Randomised volume-weighted slice quantities proportional to `volumes`, rounded down to lot
/// multiples with the remainder folded into the final slice.
pub fn vwap_slices<R: Rng>(total_quantity: u64, lot_size: u64, volumes: &[Decimal], randomness: f64, rng: &mut R) -> Vec<u64> {
    let weights: Vec<f64> = volumes.iter().map(|v| v.to_f64().unwrap_or(0.0)).collect();
    weighted_slices(total_quantity, lot_size, &weights, randomness, rng)
}

fn weighted_slices<R: Rng>(total_quantity: u64, lot_size: u64, base_weights: &[f64], randomness: f64, rng: &mut R) -> Vec<u64> {
    if base_weights.is_empty() || total_quantity == 0 {
        return Vec::new();
    }
    let lot_size = lot_size.max(1);
    let lots_total = total_quantity / lot_size;
    if lots_total == 0 {
        return Vec::new();
    }
    let mut weights: Vec<f64> = base_weights.iter().map(|w| (w.max(0.0) + 1e-9) * (1.0 + rng.random_range(-randomness..=randomness))).collect();
    let sum: f64 = weights.iter().sum();
    weights.iter_mut().for_each(|w| *w = (*w / sum).max(0.0));

    let mut lots: Vec<u64> = weights.iter().map(|w| ((lots_total as f64) * w).floor() as u64).collect();
    let allocated: u64 = lots.iter().sum();
    let mut remainder = lots_total.saturating_sub(allocated);
    let mut idx = lots.len() - 1;
    while remainder > 0 {
        lots[idx] += 1;
        remainder -= 1;
        idx = if idx == 0 { lots.len() - 1 } else { idx - 1 };
    }
    lots.into_iter().map(|l| l * lot_size).filter(|&q| q > 0).collect()
}
