/*!
# Saving Chains to CSV

Enable via the `csv` feature. Both writers label the state coordinates `dim_0 … dim_{n-1}`
and write values with Rust's shortest round-trip formatting, so a read-back `f64` equals
the sampled one bit for bit.
*/

use ndarray::{Array3, ArrayView2, Axis};
use std::error::Error;
use std::path::Path;

use csv::Writer;

use crate::adaptive::HaarioOutput;

/// Header of `index_columns` followed by one `dim_i` column per state coordinate.
fn header(index_columns: &[&str], dim: usize) -> Vec<String> {
    index_columns
        .iter()
        .map(|c| c.to_string())
        .chain((0..dim).map(|i| format!("dim_{i}")))
        .collect()
}

/// Writes one record per row of `states`, each prefixed by `prefix` and the row index.
fn write_states<W: std::io::Write, T: std::fmt::Display>(
    wtr: &mut Writer<W>,
    prefix: Option<usize>,
    states: ArrayView2<T>,
) -> csv::Result<()> {
    for (row_idx, state) in states.rows().into_iter().enumerate() {
        let record = prefix
            .into_iter()
            .chain(std::iter::once(row_idx))
            .map(|i| i.to_string())
            .chain(state.iter().map(|v| v.to_string()));
        wtr.write_record(record)?;
    }
    Ok(())
}

/**
Saves the output of [`ChainRunner::run`](crate::core::ChainRunner::run), an array of shape
`(n_chains, n_collect, n)`, as a CSV file.

The header is `chain,sample,dim_0,…`; each kept draw of each chain is one row, chains in
order and draws in the order they were recorded after burn-in.

# Examples

```rust
use haario_mcmc::io::csv::save_csv;
use ndarray::arr3;

let data = arr3(&[[[1.0, 2.0], [3.0, 4.0]]]);
save_csv(&data, "/tmp/haario_chains.csv").expect("Expecting saving data to succeed");
```
*/
pub fn save_csv<T: std::fmt::Display, P: AsRef<Path>>(
    data: &Array3<T>,
    path: P,
) -> Result<(), Box<dyn Error>> {
    let mut wtr = Writer::from_path(path)?;
    wtr.write_record(header(&["chain", "sample"], data.len_of(Axis(2))))?;
    for (chain_idx, chain) in data.outer_iter().enumerate() {
        write_states(&mut wtr, Some(chain_idx), chain)?;
    }
    wtr.flush()?;
    Ok(())
}

/**
Saves the output of a single [`adaptive_haario`](crate::adaptive::adaptive_haario) run.

The header is `iteration,dim_0,dim_1,…`, followed by one row per iteration, burn-in
included.
*/
pub fn save_params_csv<P: AsRef<Path>>(
    output: &HaarioOutput,
    path: P,
) -> Result<(), Box<dyn Error>> {
    let mut wtr = Writer::from_path(path)?;
    wtr.write_record(header(&["iteration"], output.params.ncols()))?;
    write_states(&mut wtr, None, output.params.view())?;
    wtr.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adaptive::adaptive_haario_with_rng;
    use csv::Reader;
    use ndarray::{arr1, arr2, arr3};
    use rand::rngs::SmallRng;
    use rand::SeedableRng;
    use std::fs;
    use tempfile::NamedTempFile;

    #[test]
    fn empty_sample_writes_header_only() {
        let data = arr3::<f64, 0, 0>(&[]);
        let file = NamedTempFile::new().expect("Could not create temp file");
        let filename = file.path().to_str().unwrap();

        save_csv(&data, filename).expect("Saving empty data should succeed");

        let contents = fs::read_to_string(filename).unwrap();
        assert_eq!(contents.trim(), "chain,sample");
    }

    #[test]
    fn chains_are_written_in_order() {
        let data = arr3(&[[[1, 2], [3, 4]], [[10, 20], [30, 40]]]);
        let file = NamedTempFile::new().expect("Could not create temp file");
        let filename = file.path().to_str().unwrap();

        save_csv(&data, filename).unwrap();

        let contents = fs::read_to_string(filename).unwrap();
        let expected = "\
chain,sample,dim_0,dim_1
0,0,1,2
0,1,3,4
1,0,10,20
1,1,30,40";
        assert_eq!(contents.trim(), expected);
    }

    #[test]
    fn single_run_has_one_row_per_iteration() -> Result<(), Box<dyn std::error::Error>> {
        let output = adaptive_haario_with_rng(
            arr1(&[0.0, 1.0, 2.0]),
            arr2(&[[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]]),
            25,
            SmallRng::seed_from_u64(1),
        )?;
        let file = NamedTempFile::new()?;
        let filename = file.path().to_str().unwrap();
        save_params_csv(&output, filename)?;

        let mut rdr = Reader::from_path(filename)?;
        let headers = rdr.headers()?.clone();
        assert_eq!(
            headers.iter().collect::<Vec<_>>(),
            vec!["iteration", "dim_0", "dim_1", "dim_2"]
        );

        let records: Vec<_> = rdr.records().collect::<Result<_, _>>()?;
        assert_eq!(records.len(), 25);
        for (i, record) in records.iter().enumerate() {
            assert_eq!(&record[0], i.to_string());
            let parsed: f64 = record[3].parse()?;
            assert_eq!(parsed, output.params[(i, 2)]);
        }
        Ok(())
    }

    #[test]
    fn floats_read_back_exactly() -> Result<(), Box<dyn std::error::Error>> {
        let data = arr3(&[[[0.1 + 0.2, -1.0 / 3.0]], [[f64::MIN_POSITIVE, 1e300]]]);
        let file = NamedTempFile::new()?;
        save_csv(&data, file.path())?;

        let mut rdr = Reader::from_path(file.path())?;
        let records: Vec<_> = rdr.records().collect::<Result<_, _>>()?;
        assert_eq!(records.len(), 2);
        for (chain, record) in records.iter().enumerate() {
            assert_eq!(&record[0], chain.to_string());
            assert_eq!(&record[1], "0");
            for d in 0..2 {
                let parsed: f64 = record[2 + d].parse()?;
                assert_eq!(parsed, data[(chain, 0, d)]);
            }
        }
        Ok(())
    }
}
