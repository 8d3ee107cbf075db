//! Build the fixed hyperception configuration, print its topology, and run a
//! forward pass over a random batch.
//!
//! ```sh
//! cargo run --example build_model
//! ```

use hyperception::{seed_rng, Hyperception, RawTensor, Result, TensorOps};

fn main() -> Result<()> {
    seed_rng(42);

    let mut model = Hyperception::new(&[3, 32, 32], 10).build_fixed()?;
    print!("{}", model.summary());

    model.eval();
    let x = RawTensor::randn(&[4, 3, 32, 32]);
    let y = model.forward(&x);
    println!("forward: {:?} -> {:?}", x.shape(), y.shape());

    let probs = y.borrow();
    for (i, row) in probs.data.chunks(10).enumerate() {
        let (class, p) = row
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .unwrap_or((0, &0.0));
        println!("sample {}: class {} (p={:.3})", i, class, p);
    }

    Ok(())
}
