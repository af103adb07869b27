use swarmchain_core::Vec3;

/// Assigns one target position to each drone of the swarm. `initial`
/// and `targets` have equal length; the result is indexed by drone.
pub trait TargetsMapper: Send + Sync + 'static {
    fn map(&self, initial: &[Vec3], targets: &[Vec3]) -> Vec<Vec3>;
}

/// Computes a flight path per drone from its initial position to its
/// assigned target.
pub trait PathGenerator: Send + Sync + 'static {
    fn generate(&self, initial: &[Vec3], assigned: &[Vec3]) -> Vec<Vec<Vec3>>;
}

/// Greedy assignment: each drone, in order, takes the closest target
/// not yet claimed.
#[derive(Debug, Default)]
pub struct NearestTargetMapper;

impl TargetsMapper for NearestTargetMapper {
    fn map(&self, initial: &[Vec3], targets: &[Vec3]) -> Vec<Vec3> {
        let mut remaining: Vec<Vec3> = targets.to_vec();
        let mut assigned = Vec::with_capacity(initial.len());
        for drone in initial {
            if remaining.is_empty() {
                break;
            }
            let nearest = remaining
                .iter()
                .enumerate()
                .min_by(|(_, a), (_, b)| {
                    distance_sq(drone, a)
                        .partial_cmp(&distance_sq(drone, b))
                        .unwrap_or(std::cmp::Ordering::Equal)
                })
                .map(|(i, _)| i);
            if let Some(i) = nearest {
                assigned.push(remaining.swap_remove(i));
            }
        }
        assigned
    }
}

/// Straight-line paths: two waypoints per drone, start and target.
#[derive(Debug, Default)]
pub struct LinearPathGenerator;

impl PathGenerator for LinearPathGenerator {
    fn generate(&self, initial: &[Vec3], assigned: &[Vec3]) -> Vec<Vec<Vec3>> {
        initial
            .iter()
            .zip(assigned.iter())
            .map(|(start, target)| vec![*start, *target])
            .collect()
    }
}

fn distance_sq(a: &Vec3, b: &Vec3) -> f64 {
    let dx = a.x - b.x;
    let dy = a.y - b.y;
    let dz = a.z - b.z;
    dx * dx + dy * dy + dz * dz
}
