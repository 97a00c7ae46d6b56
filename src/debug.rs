use itertools::Itertools;

/// One `from to count` line per migration.
impl std::fmt::Display for crate::demography::Flow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (from, to, n) in self.iter() {
            writeln!(f, "{} {} {}", from, to, n)?;
        }
        Ok(())
    }
}

/// One `time from to count` line per migration, oldest first.
impl std::fmt::Display for crate::demography::DemographicHistory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for t in self.start()..self.end() {
            if let Some(flow) = self.flow(t) {
                for (from, to, n) in flow.iter() {
                    writeln!(f, "{} {} {} {}", t, from, to, n)?;
                }
            }
        }
        Ok(())
    }
}

impl std::fmt::Display for crate::coalescence::Forest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for deme in self.positions() {
            writeln!(
                f,
                "{} -> {}",
                deme,
                self.trees_at(deme)
                    .iter()
                    .map(|tree| format!("[{}]", tree.iter().join(" ")))
                    .join(" ")
            )?;
        }
        Ok(())
    }
}

impl std::fmt::Display for crate::partition::FuzzyPartition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (deme, row) in self.iter() {
            writeln!(f, "{}: {:.3}", deme, row.iter().format(" "))?;
        }
        Ok(())
    }
}
