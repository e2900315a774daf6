//! Sequential Minimal Optimization (SMO) solver implementation
//!
//! Solves the dual problem
//!
//! ```text
//! min 0.5 * a^T Q a + p^T a
//! s.t. y^T a = Δ, 0 <= a_i <= C_i
//! ```
//!
//! by repeatedly optimizing a pair of variables chosen with second-order
//! working set selection (Fan, Chen and Lin, JMLR 2005). The ν variant keeps
//! the two equality constraints of ν-SVC and ν-SVR by only pairing variables
//! with equal labels.

use crate::cache::DEFAULT_CACHE_BYTES;
use crate::core::TermCriteria;
use crate::solver::QMatrix;
use log::{debug, warn};

const TAU: f64 = 1e-12;
const INF: f64 = f64::INFINITY;

/// Solver configuration
#[derive(Debug, Clone, PartialEq)]
pub struct SolverConfig {
    /// Kernel row cache budget in bytes
    pub cache_size: usize,
    /// Iteration cap per binary sub-problem
    pub max_iterations: usize,
    /// Tolerance on the maximal KKT violation
    pub epsilon: f64,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self::from_term_criteria(&TermCriteria::default())
    }
}

impl SolverConfig {
    pub fn from_term_criteria(criteria: &TermCriteria) -> Self {
        Self {
            cache_size: DEFAULT_CACHE_BYTES,
            max_iterations: criteria.max_iter,
            epsilon: criteria.epsilon,
        }
    }

    pub fn with_cache_size(mut self, cache_size: usize) -> Self {
        self.cache_size = cache_size;
        self
    }
}

/// Standard vs ν solver variant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolverVariant {
    Standard,
    Nu,
}

/// Result of one solver run
#[derive(Debug, Clone)]
pub struct SolutionInfo {
    pub obj: f64,
    pub rho: f64,
    /// (r1 + r2) / 2 of the ν variant, 0 otherwise
    pub r: f64,
    pub upper_bound_p: f64,
    pub upper_bound_n: f64,
    pub iterations: usize,
    /// False when the iteration cap was hit before the KKT tolerance was met
    pub converged: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AlphaStatus {
    LowerBound,
    UpperBound,
    Free,
}

/// SMO solver for SVM optimization
pub struct SMOSolver<'q, 'a> {
    variant: SolverVariant,
    q: &'q mut QMatrix<'a>,
    qd: Vec<f64>,
    y: Vec<i8>,
    p: Vec<f64>,
    g: Vec<f64>,
    alpha: Vec<f64>,
    status: Vec<AlphaStatus>,
    cp: f64,
    cn: f64,
    eps: f64,
}

impl<'q, 'a> SMOSolver<'q, 'a> {
    /// Run the solver; `alpha` holds the feasible starting point and receives the solution
    #[allow(clippy::too_many_arguments)]
    pub fn solve(
        variant: SolverVariant,
        q: &'q mut QMatrix<'a>,
        p: &[f64],
        y: &[i8],
        alpha: &mut [f64],
        cp: f64,
        cn: f64,
        config: &SolverConfig,
    ) -> SolutionInfo {
        let l = q.size();
        let qd = q.diagonal().to_vec();

        let mut solver = SMOSolver {
            variant,
            q,
            qd,
            y: y.to_vec(),
            p: p.to_vec(),
            g: p.to_vec(),
            alpha: alpha.to_vec(),
            status: vec![AlphaStatus::LowerBound; l],
            cp,
            cn,
            eps: config.epsilon,
        };

        for i in 0..l {
            solver.update_alpha_status(i);
        }

        // Gradient G = Q a + p
        for i in 0..l {
            if !solver.is_lower_bound(i) {
                let alpha_i = solver.alpha[i];
                let q_i = solver.q.row(i);
                for (g, q_ij) in solver.g.iter_mut().zip(&q_i) {
                    *g += alpha_i * q_ij;
                }
            }
        }

        let mut iterations = 0;
        let mut converged = false;
        while iterations < config.max_iterations {
            match solver.select_working_set() {
                Some((i, j)) => {
                    iterations += 1;
                    solver.update_alpha_pair(i, j);
                }
                None => {
                    converged = true;
                    break;
                }
            }
        }

        if !converged {
            warn!(
                "SMO reached the iteration limit ({}) before convergence",
                config.max_iterations
            );
        }

        let (rho, r) = solver.calculate_rho();
        let obj = solver
            .alpha
            .iter()
            .zip(solver.g.iter().zip(&solver.p))
            .map(|(a, (g, p))| a * (g + p))
            .sum::<f64>()
            / 2.0;

        alpha.copy_from_slice(&solver.alpha);

        let stats = solver.q.cache_stats();
        debug!(
            "optimization finished: iterations={}, obj={:.6}, rho={:.6}, cache hit rate={:.2}",
            iterations,
            obj,
            rho,
            if stats.hits + stats.misses == 0 {
                0.0
            } else {
                stats.hits as f64 / (stats.hits + stats.misses) as f64
            }
        );

        SolutionInfo {
            obj,
            rho,
            r,
            upper_bound_p: cp,
            upper_bound_n: cn,
            iterations,
            converged,
        }
    }

    fn get_c(&self, i: usize) -> f64 {
        if self.y[i] > 0 {
            self.cp
        } else {
            self.cn
        }
    }

    fn update_alpha_status(&mut self, i: usize) {
        self.status[i] = if self.alpha[i] >= self.get_c(i) {
            AlphaStatus::UpperBound
        } else if self.alpha[i] <= 0.0 {
            AlphaStatus::LowerBound
        } else {
            AlphaStatus::Free
        };
    }

    fn is_upper_bound(&self, i: usize) -> bool {
        self.status[i] == AlphaStatus::UpperBound
    }

    fn is_lower_bound(&self, i: usize) -> bool {
        self.status[i] == AlphaStatus::LowerBound
    }

    fn select_working_set(&mut self) -> Option<(usize, usize)> {
        match self.variant {
            SolverVariant::Standard => self.select_working_set_standard(),
            SolverVariant::Nu => self.select_working_set_nu(),
        }
    }

    /// Gain of moving along (i, j) under a second-order model
    fn objective_decrease(grad_diff: f64, quad_coef: f64) -> f64 {
        let denom = if quad_coef > 0.0 { quad_coef } else { TAU };
        -(grad_diff * grad_diff) / denom
    }

    fn select_working_set_standard(&mut self) -> Option<(usize, usize)> {
        let l = self.y.len();
        let mut gmax = -INF;
        let mut gmax2 = -INF;
        let mut gmax_idx = None;
        let mut gmin_idx = None;
        let mut obj_diff_min = INF;

        // i maximizes -y_t * G_t over I_up
        for t in 0..l {
            if self.y[t] == 1 {
                if !self.is_upper_bound(t) && -self.g[t] >= gmax {
                    gmax = -self.g[t];
                    gmax_idx = Some(t);
                }
            } else if !self.is_lower_bound(t) && self.g[t] >= gmax {
                gmax = self.g[t];
                gmax_idx = Some(t);
            }
        }

        let i = gmax_idx?;
        let q_i = self.q.row(i);
        let y_i = f64::from(self.y[i]);

        // j minimizes the second-order objective change over I_low
        for j in 0..l {
            if self.y[j] == 1 {
                if !self.is_lower_bound(j) {
                    let grad_diff = gmax + self.g[j];
                    gmax2 = gmax2.max(self.g[j]);
                    if grad_diff > 0.0 {
                        let quad_coef = self.qd[i] + self.qd[j] - 2.0 * y_i * q_i[j];
                        let obj_diff = Self::objective_decrease(grad_diff, quad_coef);
                        if obj_diff <= obj_diff_min {
                            gmin_idx = Some(j);
                            obj_diff_min = obj_diff;
                        }
                    }
                }
            } else if !self.is_upper_bound(j) {
                let grad_diff = gmax - self.g[j];
                gmax2 = gmax2.max(-self.g[j]);
                if grad_diff > 0.0 {
                    let quad_coef = self.qd[i] + self.qd[j] + 2.0 * y_i * q_i[j];
                    let obj_diff = Self::objective_decrease(grad_diff, quad_coef);
                    if obj_diff <= obj_diff_min {
                        gmin_idx = Some(j);
                        obj_diff_min = obj_diff;
                    }
                }
            }
        }

        if gmax + gmax2 < self.eps {
            return None;
        }
        gmin_idx.map(|j| (i, j))
    }

    fn select_working_set_nu(&mut self) -> Option<(usize, usize)> {
        let l = self.y.len();
        let mut gmaxp = -INF;
        let mut gmaxp2 = -INF;
        let mut gmaxp_idx = None;
        let mut gmaxn = -INF;
        let mut gmaxn2 = -INF;
        let mut gmaxn_idx = None;
        let mut gmin_idx = None;
        let mut obj_diff_min = INF;

        for t in 0..l {
            if self.y[t] == 1 {
                if !self.is_upper_bound(t) && -self.g[t] >= gmaxp {
                    gmaxp = -self.g[t];
                    gmaxp_idx = Some(t);
                }
            } else if !self.is_lower_bound(t) && self.g[t] >= gmaxn {
                gmaxn = self.g[t];
                gmaxn_idx = Some(t);
            }
        }

        let q_ip = gmaxp_idx.map(|ip| self.q.row(ip));
        let q_in = gmaxn_idx.map(|in_| self.q.row(in_));

        for j in 0..l {
            if self.y[j] == 1 {
                if !self.is_lower_bound(j) {
                    let grad_diff = gmaxp + self.g[j];
                    gmaxp2 = gmaxp2.max(self.g[j]);
                    if grad_diff > 0.0 {
                        if let (Some(ip), Some(q_ip)) = (gmaxp_idx, &q_ip) {
                            let quad_coef = self.qd[ip] + self.qd[j] - 2.0 * q_ip[j];
                            let obj_diff = Self::objective_decrease(grad_diff, quad_coef);
                            if obj_diff <= obj_diff_min {
                                gmin_idx = Some(j);
                                obj_diff_min = obj_diff;
                            }
                        }
                    }
                }
            } else if !self.is_upper_bound(j) {
                let grad_diff = gmaxn - self.g[j];
                gmaxn2 = gmaxn2.max(-self.g[j]);
                if grad_diff > 0.0 {
                    if let (Some(in_), Some(q_in)) = (gmaxn_idx, &q_in) {
                        let quad_coef = self.qd[in_] + self.qd[j] - 2.0 * q_in[j];
                        let obj_diff = Self::objective_decrease(grad_diff, quad_coef);
                        if obj_diff <= obj_diff_min {
                            gmin_idx = Some(j);
                            obj_diff_min = obj_diff;
                        }
                    }
                }
            }
        }

        if f64::max(gmaxp + gmaxp2, gmaxn + gmaxn2) < self.eps {
            return None;
        }

        let j = gmin_idx?;
        let i = if self.y[j] == 1 { gmaxp_idx? } else { gmaxn_idx? };
        Some((i, j))
    }

    fn update_alpha_pair(&mut self, i: usize, j: usize) {
        let q_i = self.q.row(i);
        let q_j = self.q.row(j);

        let c_i = self.get_c(i);
        let c_j = self.get_c(j);
        let old_alpha_i = self.alpha[i];
        let old_alpha_j = self.alpha[j];

        if self.y[i] != self.y[j] {
            let mut quad_coef = self.qd[i] + self.qd[j] + 2.0 * q_i[j];
            if quad_coef <= 0.0 {
                quad_coef = TAU;
            }
            let delta = (-self.g[i] - self.g[j]) / quad_coef;
            let diff = self.alpha[i] - self.alpha[j];
            self.alpha[i] += delta;
            self.alpha[j] += delta;

            if diff > 0.0 {
                if self.alpha[j] < 0.0 {
                    self.alpha[j] = 0.0;
                    self.alpha[i] = diff;
                }
            } else if self.alpha[i] < 0.0 {
                self.alpha[i] = 0.0;
                self.alpha[j] = -diff;
            }
            if diff > c_i - c_j {
                if self.alpha[i] > c_i {
                    self.alpha[i] = c_i;
                    self.alpha[j] = c_i - diff;
                }
            } else if self.alpha[j] > c_j {
                self.alpha[j] = c_j;
                self.alpha[i] = c_j + diff;
            }
        } else {
            let mut quad_coef = self.qd[i] + self.qd[j] - 2.0 * q_i[j];
            if quad_coef <= 0.0 {
                quad_coef = TAU;
            }
            let delta = (self.g[i] - self.g[j]) / quad_coef;
            let sum = self.alpha[i] + self.alpha[j];
            self.alpha[i] -= delta;
            self.alpha[j] += delta;

            if sum > c_i {
                if self.alpha[i] > c_i {
                    self.alpha[i] = c_i;
                    self.alpha[j] = sum - c_i;
                }
            } else if self.alpha[j] < 0.0 {
                self.alpha[j] = 0.0;
                self.alpha[i] = sum;
            }
            if sum > c_j {
                if self.alpha[j] > c_j {
                    self.alpha[j] = c_j;
                    self.alpha[i] = sum - c_j;
                }
            } else if self.alpha[i] < 0.0 {
                self.alpha[i] = 0.0;
                self.alpha[j] = sum;
            }
        }

        let delta_i = self.alpha[i] - old_alpha_i;
        let delta_j = self.alpha[j] - old_alpha_j;
        for (k, g) in self.g.iter_mut().enumerate() {
            *g += q_i[k] * delta_i + q_j[k] * delta_j;
        }

        self.update_alpha_status(i);
        self.update_alpha_status(j);
    }

    fn calculate_rho(&self) -> (f64, f64) {
        match self.variant {
            SolverVariant::Standard => (self.calculate_rho_standard(), 0.0),
            SolverVariant::Nu => self.calculate_rho_nu(),
        }
    }

    fn calculate_rho_standard(&self) -> f64 {
        let mut nr_free = 0;
        let mut ub = INF;
        let mut lb = -INF;
        let mut sum_free = 0.0;

        for i in 0..self.y.len() {
            let yg = f64::from(self.y[i]) * self.g[i];
            if self.is_upper_bound(i) {
                if self.y[i] == -1 {
                    ub = ub.min(yg);
                } else {
                    lb = lb.max(yg);
                }
            } else if self.is_lower_bound(i) {
                if self.y[i] == 1 {
                    ub = ub.min(yg);
                } else {
                    lb = lb.max(yg);
                }
            } else {
                nr_free += 1;
                sum_free += yg;
            }
        }

        if nr_free > 0 {
            sum_free / nr_free as f64
        } else {
            (ub + lb) / 2.0
        }
    }

    fn calculate_rho_nu(&self) -> (f64, f64) {
        let mut nr_free = [0usize; 2];
        let mut ub = [INF; 2];
        let mut lb = [-INF; 2];
        let mut sum_free = [0.0; 2];

        for i in 0..self.y.len() {
            let side = usize::from(self.y[i] != 1);
            if self.is_upper_bound(i) {
                lb[side] = lb[side].max(self.g[i]);
            } else if self.is_lower_bound(i) {
                ub[side] = ub[side].min(self.g[i]);
            } else {
                nr_free[side] += 1;
                sum_free[side] += self.g[i];
            }
        }

        let r = |side: usize| {
            if nr_free[side] > 0 {
                sum_free[side] / nr_free[side] as f64
            } else {
                (ub[side] + lb[side]) / 2.0
            }
        };
        let (r1, r2) = (r(0), r(1));
        ((r1 - r2) / 2.0, (r1 + r2) / 2.0)
    }
}
