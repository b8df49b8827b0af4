//! Primitive draws shared by the generator and the derivation.
//!
//! Each helper consumes a fixed number of values from the stream so the
//! overall draw order stays reproducible.

use rand::Rng;
use uuid::Uuid;

/// Bernoulli draw. Always consumes one `f64`.
pub fn chance<R: Rng + ?Sized>(rng: &mut R, probability: f64) -> bool {
    rng.gen::<f64>() < probability
}

/// Uniform `[0, 1)`.
pub fn unit<R: Rng + ?Sized>(rng: &mut R) -> f64 {
    rng.gen::<f64>()
}

/// Version-4 identifier built from 16 bytes of the stream.
pub fn record_id<R: Rng + ?Sized>(rng: &mut R) -> Uuid {
    let bytes: [u8; 16] = rng.gen();
    uuid::Builder::from_random_bytes(bytes).into_uuid()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_chance_extremes() {
        let mut rng = StdRng::seed_from_u64(7);
        assert!((0..1000).all(|_| chance(&mut rng, 1.0)));
        assert!((0..1000).all(|_| !chance(&mut rng, 0.0)));
    }

    #[test]
    fn test_record_id_is_v4_and_seeded() {
        let a = record_id(&mut StdRng::seed_from_u64(1));
        let b = record_id(&mut StdRng::seed_from_u64(1));
        assert_eq!(a, b);
        assert_eq!(a.get_version_num(), 4);
    }
}
