//! # Market
//!
//! $$
//! x_{i,t}=\frac{p_{i,t}}{p_{i,t-1}}
//! $$
//!
//! Validated price and relative-price matrices (`n_assets × n_periods`,
//! columns in chronological order).

use ndarray::s;
use ndarray::Array1;
use ndarray::Array2;
use ndarray::ArrayView1;
use ndarray::ArrayView2;

use crate::error::OpsError;
use crate::error::Result;

fn validate_positive(data: &Array2<f64>, what: &str) -> Result<()> {
  if data.nrows() == 0 || data.ncols() == 0 {
    return Err(OpsError::InvalidMarketData(format!(
      "{what} must have at least one asset and one period, got shape {:?}",
      data.dim()
    )));
  }

  if let Some(((asset, period), v)) = data
    .indexed_iter()
    .find(|(_, v)| !v.is_finite() || **v <= 0.0)
  {
    return Err(OpsError::InvalidMarketData(format!(
      "{what} must be strictly positive and finite, got {v} at asset {asset}, period {period}"
    )));
  }

  Ok(())
}

/// Immutable strictly positive price matrix.
#[derive(Clone, Debug)]
pub struct PriceMatrix(Array2<f64>);

impl PriceMatrix {
  pub fn new(prices: Array2<f64>) -> Result<Self> {
    validate_positive(&prices, "price matrix")?;
    Ok(Self(prices))
  }

  pub fn n_assets(&self) -> usize {
    self.0.nrows()
  }

  pub fn n_periods(&self) -> usize {
    self.0.ncols()
  }

  pub fn view(&self) -> ArrayView2<'_, f64> {
    self.0.view()
  }

  pub fn column(&self, t: usize) -> ArrayView1<'_, f64> {
    self.0.column(t)
  }

  /// Price columns `start..=end`, with `start` clipped to the first period.
  pub fn trailing(&self, end: usize, len: usize) -> ArrayView2<'_, f64> {
    let start = (end + 1).saturating_sub(len);
    self.0.slice(s![.., start..=end])
  }

  /// Elementwise `p[:, t] / p[:, t - 1]`.
  pub fn relatives(&self) -> Result<RelativePriceMatrix> {
    if self.n_periods() < 2 {
      return Err(OpsError::InvalidMarketData(
        "at least two price periods are needed to form relative prices".to_string(),
      ));
    }
    let prev = self.0.slice(s![.., ..-1]);
    let next = self.0.slice(s![.., 1..]);
    RelativePriceMatrix::new(&next / &prev)
  }
}

/// Immutable strictly positive relative-price matrix.
#[derive(Clone, Debug)]
pub struct RelativePriceMatrix(Array2<f64>);

impl RelativePriceMatrix {
  pub fn new(relatives: Array2<f64>) -> Result<Self> {
    validate_positive(&relatives, "relative price matrix")?;
    Ok(Self(relatives))
  }

  pub fn n_assets(&self) -> usize {
    self.0.nrows()
  }

  pub fn n_periods(&self) -> usize {
    self.0.ncols()
  }

  pub fn view(&self) -> ArrayView2<'_, f64> {
    self.0.view()
  }

  pub fn column(&self, t: usize) -> ArrayView1<'_, f64> {
    self.0.column(t)
  }

  /// Relative columns `0..end`.
  pub fn history(&self, end: usize) -> ArrayView2<'_, f64> {
    self.0.slice(s![.., ..end])
  }

  /// Price path obtained by chaining relatives from a unit starting price.
  pub fn to_prices(&self) -> PriceMatrix {
    let n_assets = self.n_assets();
    let mut prices = Array2::<f64>::ones((n_assets, self.n_periods() + 1));
    for t in 0..self.n_periods() {
      let next: Array1<f64> = &prices.column(t) * &self.0.column(t);
      prices.column_mut(t + 1).assign(&next);
    }
    PriceMatrix(prices)
  }
}

/// Prices and relatives of the same market.
///
/// Investing in relative period `s` may read relative columns `0..s` and
/// price columns `0..=s`.
#[derive(Clone, Debug)]
pub struct Market {
  prices: PriceMatrix,
  relatives: RelativePriceMatrix,
}

impl Market {
  pub fn from_prices(prices: Array2<f64>) -> Result<Self> {
    let prices = PriceMatrix::new(prices)?;
    let relatives = prices.relatives()?;
    Ok(Self { prices, relatives })
  }

  pub fn from_relatives(relatives: Array2<f64>) -> Result<Self> {
    let relatives = RelativePriceMatrix::new(relatives)?;
    let prices = relatives.to_prices();
    Ok(Self { prices, relatives })
  }

  pub fn prices(&self) -> &PriceMatrix {
    &self.prices
  }

  pub fn relatives(&self) -> &RelativePriceMatrix {
    &self.relatives
  }

  pub fn n_assets(&self) -> usize {
    self.relatives.n_assets()
  }

  /// Number of investable (relative) periods.
  pub fn n_periods(&self) -> usize {
    self.relatives.n_periods()
  }

  /// Number of price observations, `n_periods() + 1`.
  pub fn n_samples(&self) -> usize {
    self.prices.n_periods()
  }
}

#[cfg(test)]
mod tests {
  use approx::assert_abs_diff_eq;
  use ndarray::array;

  use super::*;

  #[test]
  fn relatives_are_price_ratios() {
    let market = Market::from_prices(array![[10.0, 11.0, 9.9], [5.0, 5.0, 5.5]]).unwrap();
    let rel = market.relatives().view().to_owned();

    assert_eq!(rel.dim(), (2, 2));
    assert_abs_diff_eq!(rel, array![[1.1, 0.9], [1.0, 1.1]], epsilon = 1e-12);
    assert_eq!(market.n_samples(), 3);
  }

  #[test]
  fn synthesized_prices_reproduce_relatives() {
    let rel = array![[1.02, 0.97, 1.01], [0.99, 1.03, 1.0]];
    let market = Market::from_relatives(rel.clone()).unwrap();

    assert_abs_diff_eq!(market.prices().column(0).to_owned(), array![1.0, 1.0]);
    let back = market.prices().relatives().unwrap();
    assert_abs_diff_eq!(back.view().to_owned(), rel, epsilon = 1e-12);
  }

  #[test]
  fn rejects_non_positive_entries() {
    let err = Market::from_relatives(array![[1.0, 0.0]]).unwrap_err();
    assert!(matches!(err, OpsError::InvalidMarketData(_)));

    let err = Market::from_prices(array![[1.0, f64::NAN, 2.0]]).unwrap_err();
    assert!(matches!(err, OpsError::InvalidMarketData(_)));
  }

  #[test]
  fn trailing_window_clips_at_history_start() {
    let prices = PriceMatrix::new(array![[1.0, 2.0, 3.0, 4.0]]).unwrap();
    assert_eq!(prices.trailing(1, 5).ncols(), 2);
    assert_eq!(prices.trailing(3, 2).to_owned(), array![[3.0, 4.0]]);
  }
}
