use log::debug;

/// RandMode controls random generator behaviour. Predictable after an
/// explicit seed (tests, negative `random` operands), random otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RandMode {
    Predictable,
    RandomUniform,
}

/// Linear-congruential generator behind the `random` opcode.
///
/// The whole state is one 32-bit seed, so saving it or running two
/// interpreters side by side needs nothing shared.
#[derive(Debug, Clone)]
pub struct ZRand {
    seed: u32,
    rand_mode: RandMode,
}

impl ZRand {
    pub fn new_uniform() -> ZRand {
        ZRand {
            seed: rand::random::<u32>(),
            rand_mode: RandMode::RandomUniform,
        }
    }

    pub fn new_predictable(seed: u32) -> ZRand {
        ZRand {
            seed,
            rand_mode: RandMode::Predictable,
        }
    }

    pub fn mode(&self) -> RandMode {
        self.rand_mode
    }

    /// Advance the generator and return a value in [0..32767]
    pub fn gen_unsigned_rand(&mut self) -> u16 {
        self.seed = self.seed.wrapping_mul(1_103_515_245).wrapping_add(12_345);
        ((self.seed >> 16) & 0x7FFF) as u16
    }

    /// Semantics of the `random` opcode operand.
    ///
    /// Positive `range` yields a value in [1, range]. Zero reseeds from
    /// an unpredictable source and negative values reseed with their
    /// magnitude; both return 0.
    pub fn random(&mut self, range: i16) -> u16 {
        match range {
            r if r > 0 => self.gen_unsigned_rand() % (r as u16) + 1,
            0 => {
                self.seed = rand::random::<u32>();
                self.rand_mode = RandMode::RandomUniform;
                debug!("Random generator reseeded unpredictably");
                0
            }
            r => {
                self.seed = r.unsigned_abs() as u32;
                self.rand_mode = RandMode::Predictable;
                debug!("Random generator seeded with {}", self.seed);
                0
            }
        }
    }
}
