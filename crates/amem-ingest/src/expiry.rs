use amem_core::Lifespan;
use chrono::{DateTime, Utc};

/// Expiry per §3.1/§4.4: `lifespan`'s base duration scaled by
/// `(1 - forget_score)`, absent entirely for `Lifelong`.
pub fn compute_expiry(lifespan: Lifespan, forget_score: f32, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
  let base = lifespan.base_duration()?;
  let factor = (1.0 - forget_score.clamp(0.0, 1.0)) as f64;
  let secs = (base.num_seconds() as f64 * factor).round().max(0.0) as i64;
  Some(now + chrono::Duration::seconds(secs))
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn lifelong_never_expires() {
    let now = Utc::now();
    assert!(compute_expiry(Lifespan::Lifelong, 0.0, now).is_none());
    assert!(compute_expiry(Lifespan::Lifelong, 0.9, now).is_none());
  }

  #[test]
  fn forget_score_shrinks_the_window() {
    let now = Utc::now();
    let full = compute_expiry(Lifespan::ShortTerm, 0.0, now).unwrap();
    let halved = compute_expiry(Lifespan::ShortTerm, 0.5, now).unwrap();
    assert_eq!(full - now, chrono::Duration::days(7));
    assert_eq!(halved - now, chrono::Duration::seconds(7 * 86400 / 2));
  }

  #[test]
  fn forget_score_is_clamped() {
    let now = Utc::now();
    let over = compute_expiry(Lifespan::ShortTerm, 1.5, now).unwrap();
    assert_eq!(over, now);
  }
}
