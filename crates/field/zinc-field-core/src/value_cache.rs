/// Result buffer for one field at one location.
///
/// `derivatives` is row-major: component `c` occupies
/// `derivatives[c * number_of_derivatives..(c + 1) * number_of_derivatives]`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ValueCache {
    pub values: Vec<f64>,
    pub derivatives: Vec<f64>,
    pub number_of_derivatives: usize,
    pub derivatives_valid: bool,
}

impl ValueCache {
    /// Zeroed values; derivative storage is allocated only when requested.
    pub fn new(components: usize, number_of_derivatives: usize) -> Self {
        Self {
            values: vec![0.0; components],
            derivatives: vec![0.0; components * number_of_derivatives],
            number_of_derivatives,
            derivatives_valid: false,
        }
    }

    pub fn from_values(values: Vec<f64>) -> Self {
        Self {
            values,
            ..Self::default()
        }
    }

    pub fn number_of_components(&self) -> usize {
        self.values.len()
    }

    /// Derivatives of one component, or `None` past the last component.
    pub fn derivative_row(&self, component: usize) -> Option<&[f64]> {
        let n = self.number_of_derivatives;
        self.derivatives.get(component * n..(component + 1) * n)
    }

    pub fn derivative_row_mut(&mut self, component: usize) -> &mut [f64] {
        let n = self.number_of_derivatives;
        &mut self.derivatives[component * n..(component + 1) * n]
    }

    /// Derivatives if they were computed for this location, else `None`.
    pub fn valid_derivatives(&self) -> Option<&[f64]> {
        self.derivatives_valid.then_some(self.derivatives.as_slice())
    }

    pub(crate) fn invalidate_derivatives(&mut self) {
        self.derivatives_valid = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derivative_rows_are_component_major() {
        let mut cache = ValueCache::new(2, 3);
        cache.derivative_row_mut(1).copy_from_slice(&[1.0, 2.0, 3.0]);
        assert_eq!(cache.derivatives, vec![0.0, 0.0, 0.0, 1.0, 2.0, 3.0]);
        assert!(cache.valid_derivatives().is_none());
        cache.derivatives_valid = true;
        assert_eq!(cache.valid_derivatives().map(<[f64]>::len), Some(6));
    }
}
