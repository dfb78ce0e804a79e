use core::fmt;

/// Compute device of a run, resolved once at startup.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeviceKind {
    Cpu,
    Cuda,
    /// Apple GPUs, through the wgpu backend.
    Mps,
}

impl DeviceKind {
    /// Picks the first accelerator compiled in and not disabled, CUDA before MPS, and falls back
    /// to the CPU.
    pub fn select(no_cuda: bool, no_mps: bool) -> Self {
        Self::resolve(
            !no_cuda && cfg!(feature = "cuda"),
            !no_mps && cfg!(feature = "mps"),
        )
    }

    fn resolve(use_cuda: bool, use_mps: bool) -> Self {
        if use_cuda {
            DeviceKind::Cuda
        } else if use_mps {
            DeviceKind::Mps
        } else {
            DeviceKind::Cpu
        }
    }
}

impl fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceKind::Cpu => f.write_str("cpu"),
            DeviceKind::Cuda => f.write_str("cuda"),
            DeviceKind::Mps => f.write_str("mps"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cuda_takes_precedence_over_mps() {
        assert_eq!(DeviceKind::resolve(true, true), DeviceKind::Cuda);
        assert_eq!(DeviceKind::resolve(false, true), DeviceKind::Mps);
        assert_eq!(DeviceKind::resolve(false, false), DeviceKind::Cpu);
    }

    #[test]
    fn disabled_accelerators_fall_back_to_cpu() {
        assert_eq!(DeviceKind::select(true, true), DeviceKind::Cpu);
    }
}
