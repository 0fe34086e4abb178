use rand::SeedableRng;

// Seeded rng for replicable tests.
pub fn seeded_rng() -> (impl rand::CryptoRng + rand::RngCore) {
    const TEST_RNG_SEED: [u8; 32] = *b"NEVER USE THIS FOR ANYTHING REAL";
    rand::rngs::StdRng::from_seed(TEST_RNG_SEED)
}

// Pick out the given slots of a message, for use as the expected values of an opening proof.
pub fn slots<const N: usize>(
    msg: &bolt_crypto::Message<N>,
    indices: &[usize],
) -> Vec<(usize, bls12_381::Scalar)> {
    indices.iter().map(|&i| (i, msg[i])).collect()
}
