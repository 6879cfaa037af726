// https://www.johndcook.com/blog/standard_deviation/
#[derive(Debug, Clone, Default)]
pub struct Average {
    avg: f64,
    k: f64,
}

impl Average {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, value: impl Into<f64>) {
        let value = value.into();
        self.k += 1.0;
        self.avg += (value - self.avg) / self.k;
    }

    pub fn average(&self) -> f64 {
        self.avg
    }

    pub fn count(&self) -> u64 {
        self.k as u64
    }
}

impl<A: Into<f64>> Extend<A> for Average {
    fn extend<T: IntoIterator<Item = A>>(&mut self, iter: T) {
        iter.into_iter().for_each(|a| self.add(a))
    }
}

/// The largest value seen so far, `None` until something is added.
#[derive(Debug, Clone, Copy, Default)]
pub struct Peak(Option<f64>);

impl Peak {
    pub fn add(&mut self, value: impl Into<f64>) {
        let value = value.into();
        self.0 = Some(self.0.map_or(value, |peak| peak.max(value)));
    }

    pub fn peak(&self) -> Option<f64> {
        self.0
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn float_cmp(a: f64, b: f64) -> bool {
        (a - b).abs() <= 0.01
    }

    #[test]
    fn average() {
        let mut avg = Average::new();
        assert_eq!(0.0, avg.average());
        assert_eq!(0, avg.count());

        avg.add(1);
        assert!(float_cmp(1.0, avg.average()));

        avg.add(2);
        assert!(float_cmp(1.5, avg.average()));

        avg.extend([3]);
        assert!(float_cmp(2.0, avg.average()));
        assert_eq!(3, avg.count());
    }

    #[test]
    fn peak() {
        let mut peak = Peak::default();
        assert_eq!(None, peak.peak());

        peak.add(2.5);
        peak.add(1.0);
        assert_eq!(Some(2.5), peak.peak());
    }
}
