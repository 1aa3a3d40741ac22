use sem_core::{Axis, ParameterCombination, ParameterSpace};

/// Cartesian product of the space in declared order, first axis slowest.
pub fn expand_space(space: &ParameterSpace) -> Vec<ParameterCombination> {
    let mut outputs = Vec::new();
    expand_grid(space.axes(), ParameterCombination::new(), &mut outputs);
    outputs
}

fn expand_grid(
    axes: &[Axis],
    current: ParameterCombination,
    outputs: &mut Vec<ParameterCombination>,
) {
    let Some((axis, rest)) = axes.split_first() else {
        outputs.push(current);
        return;
    };
    for value in &axis.values {
        expand_grid(rest, current.with(axis.name.clone(), value.clone()), outputs);
    }
}
