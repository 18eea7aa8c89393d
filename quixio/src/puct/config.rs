/// Configuration for PUCT search
#[derive(Debug, Clone)]
pub struct PuctConfig {
    /// Simulations per search
    pub iterations: u32,

    /// Exploration constant
    pub c_puct: f32,

    /// Move selection temperature (below 0.01 picks the most visited move)
    pub temperature: f32,

    /// Whether to mix Dirichlet noise into the root priors
    pub add_dirichlet_noise: bool,

    pub dirichlet_alpha: f32,

    /// Weight of the noise in the mixed prior
    pub dirichlet_epsilon: f32,

    /// Rule variant for move generation inside the tree
    pub allow_pushing_opponent: bool,
}

impl PuctConfig {
    /// Settings used while generating training games: more simulations,
    /// sampled moves and root noise.
    pub fn for_self_play() -> Self {
        Self::default()
            .with_iterations(400)
            .with_temperature(1.0)
            .with_dirichlet_noise(0.03, 0.25)
    }

    pub fn with_iterations(mut self, n: u32) -> Self {
        self.iterations = n;
        self
    }

    pub fn with_c_puct(mut self, c: f32) -> Self {
        self.c_puct = c;
        self
    }

    pub fn with_temperature(mut self, t: f32) -> Self {
        self.temperature = t;
        self
    }

    pub fn with_dirichlet_noise(mut self, alpha: f32, epsilon: f32) -> Self {
        self.add_dirichlet_noise = true;
        self.dirichlet_alpha = alpha;
        self.dirichlet_epsilon = epsilon;
        self
    }

    pub fn without_dirichlet_noise(mut self) -> Self {
        self.add_dirichlet_noise = false;
        self
    }

    pub fn with_pushing_opponent(mut self, allow: bool) -> Self {
        self.allow_pushing_opponent = allow;
        self
    }
}

impl Default for PuctConfig {
    fn default() -> Self {
        Self {
            iterations: 200,
            c_puct: 1.5,
            temperature: 0.0,
            add_dirichlet_noise: false,
            dirichlet_alpha: 0.03,
            dirichlet_epsilon: 0.25,
            allow_pushing_opponent: false,
        }
    }
}
