// Integration tests for w2v-nn operations and the w2v file formats
//
// These tests check that the operations compose into a trainable pipeline,
// that parameters survive a checkpoint round-trip through the filesystem,
// and that trained vectors can be written out and read back.

use w2v::prelude::*;
use w2v::{checkpoint, vectors};

fn approx_eq(a: f64, b: f64, tol: f64) -> bool {
    (a - b).abs() < tol
}

fn assert_vec_approx(got: &[f64], expected: &[f64], tol: f64) {
    assert_eq!(
        got.len(),
        expected.len(),
        "length mismatch: {} vs {}",
        got.len(),
        expected.len()
    );
    for (i, (g, e)) in got.iter().zip(expected.iter()).enumerate() {
        assert!(
            approx_eq(*g, *e, tol),
            "index {}: got {} expected {} (tol {})",
            i,
            g,
            e,
            tol
        );
    }
}

// Single-operation behaviour through the facade

#[test]
fn test_embeddings_lookup_and_sparse_step() -> w2v::Result<()> {
    let table = Matrix::<f64>::new([10, 6]);
    for r in 0..10 {
        for c in 0..6 {
            table.set([r, c], (10 * r + c) as f64);
        }
    }
    let mut emb = Embeddings::from_tensor(table.clone());
    let idx = Matrix::from_vec([2, 1], vec![3.0, 5.0])?;

    let out = emb.evaluate(&[&idx])?;
    assert_vec_approx(
        &out.to_vec(),
        &[30., 31., 32., 33., 34., 35., 50., 51., 52., 53., 54., 55.],
        1e-12,
    );

    let error = Matrix::from_vec([2, 6], (0..12).map(f64::from).collect::<Vec<f64>>())?;
    emb.backward(&[&idx], &error)?;
    emb.step(1.0);
    assert_vec_approx(
        &table.slice(3)?.to_vec(),
        &[30., 32., 34., 36., 38., 40.],
        1e-12,
    );
    assert_vec_approx(
        &table.slice(5)?.to_vec(),
        &[56., 58., 60., 62., 64., 66.],
        1e-12,
    );

    emb.step(1.0);
    assert_vec_approx(
        &table.slice(3)?.to_vec(),
        &[30., 32., 34., 36., 38., 40.],
        1e-12,
    );
    Ok(())
}

#[test]
fn test_sigmoid_forward_backward() -> w2v::Result<()> {
    let input = Matrix::from_vec([8, 1], vec![1., -2., 3., -4., 5., -6., 7., -8.])?;
    let out = Sigmoid.evaluate(&[&input])?;
    assert_vec_approx(
        &out.to_vec(),
        &[
            0.7310586, 0.1192029, 0.952574, 0.0179862, 0.9933071, 0.0024726, 0.9990889, 0.0003354,
        ],
        1e-6,
    );

    let error = Matrix::from_vec([8, 1], vec![0., 0., 0., 0., 1., 0., 0., 0.])?;
    let grads = Sigmoid.backward(&[&input], &error)?;
    assert_vec_approx(
        &grads[0].to_vec(),
        &[0., 0., 0., 0., 0.0066480329, 0., 0., 0.],
        1e-6,
    );
    Ok(())
}

#[test]
fn test_matmul_through_op_enum() -> w2v::Result<()> {
    let left = Matrix::from_vec([1, 5], vec![1., 2., -3., 4., 5.])?;
    let right = Matrix::from_vec(
        [5, 4],
        vec![
            -11., 12., 13., 14., 21., 22., 23., 24., 31., 32., 33., 34., 41., 42., 43., 44., 51.,
            52., 53., 54.,
        ],
    )?;
    let mut op: Op<f64> = MatrixMultiply.into();
    assert_eq!(op.name(), "MatrixMultiply");

    let out = op.evaluate(&[&left, &right])?;
    assert_vec_approx(&out.to_vec(), &[357., 388., 397., 406.], 1e-12);

    let error = Matrix::from_vec([1, 4], vec![1., 2., 3., -4.])?;
    let grads = op.backward(&[&left, &right], &error)?;
    assert_vec_approx(&grads[0].to_vec(), &[-4., 38., 58., 78., 98.], 1e-12);
    assert_eq!(grads[1].shape(), &[5, 4]);
    assert_vec_approx(&grads[1].slice(2)?.to_vec(), &[-3., -6., -9., 12.], 1e-12);
    Ok(())
}

#[test]
fn test_weights_step_rule() -> w2v::Result<()> {
    let data = Matrix::from_vec([8, 1], vec![1., -2., 3., -4., 5., -6., 7., -8.])?;
    let mut w: Op<f64> = Weights::from_tensor(data.clone()).into();
    let error = Matrix::from_vec([8, 1], vec![-1., 2., 3., -5., -8., 13., -21., -34.])?;

    assert!(w.backward(&[], &error)?.is_empty());
    w.step(1.0);
    assert_vec_approx(
        &data.to_vec(),
        &[2., -4., 0., 1., 13., -19., 28., 26.],
        1e-12,
    );
    w.step(1.0);
    assert_vec_approx(
        &data.to_vec(),
        &[2., -4., 0., 1., 13., -19., 28., 26.],
        1e-12,
    );
    Ok(())
}

// Composition

/// One lookup -> dot product -> sigmoid pipeline trained towards a target of
/// 1 with squared error. Weights descend with a positive rate; Embeddings
/// apply the rate as given, so they receive its negation.
#[test]
fn test_pipeline_loss_decreases() -> w2v::Result<()> {
    let cfg = InitConfig::new().seed(2024);
    let mut emb = Embeddings::<f64>::new(5, 3, &cfg)?;
    let mut weights = Weights::<f64>::initialised([3, 1], &cfg.seed(7))?;
    let mm = MatrixMultiply;
    let sig = Sigmoid;
    let idx = Matrix::from_vec([1, 1], vec![2.0])?;
    let lr = 0.5;

    let mut losses = Vec::new();
    for _ in 0..50 {
        let x = emb.evaluate(&[&idx])?;
        let w = weights.evaluate(&[])?;
        let z = mm.evaluate(&[&x, &w])?;
        let s = sig.evaluate(&[&z])?;

        let diff = s.get([0, 0]) - 1.0;
        losses.push(0.5 * diff * diff);

        let ds = Matrix::full([1, 1], diff);
        let dz = Sigmoid.backward(&[&z], &ds)?;
        let grads = MatrixMultiply.backward(&[&x, &w], &dz[0])?;
        weights.backward(&[], &grads[1])?;
        emb.backward(&[&idx], &grads[0])?;

        weights.step(lr);
        emb.step(-lr);
    }

    let first = losses[0];
    let last = losses[losses.len() - 1];
    assert!(last < first, "loss went from {first} to {last}");
    assert!(losses.windows(2).all(|w| w[1] <= w[0] + 1e-12));
    Ok(())
}

// Files

#[test]
fn test_checkpoint_file_roundtrip() -> w2v::Result<()> {
    let cfg = InitConfig::new().seed(99);
    let emb = Embeddings::<f32>::new(7, 4, &cfg)?;
    let weights = Weights::<f32>::initialised([4, 2], &cfg)?;
    let dict = StateDict::new()
        .with_child("embeddings", emb.state_dict())
        .with_child("output", weights.state_dict());

    let path = std::env::temp_dir().join("w2v_test_checkpoint.w2vc");
    checkpoint::save(&path, &dict)?;
    let loaded = checkpoint::load::<f32>(&path)?;
    std::fs::remove_file(&path)?;

    assert_eq!(loaded.num_tensors(), 2);
    let mut restored = Embeddings::<f32>::from_tensor(Matrix::new([1, 1]));
    restored.load_state_dict(&loaded.children["embeddings"])?;
    assert_eq!(restored.table().unwrap().shape(), &[7, 4]);
    assert_eq!(
        restored.table().unwrap().to_vec(),
        emb.table().unwrap().to_vec()
    );

    let mut out = Weights::<f32>::new();
    out.load_state_dict(&loaded.children["output"])?;
    assert_eq!(
        out.parameter().unwrap().to_vec(),
        weights.parameter().unwrap().to_vec()
    );

    // A nested dict cannot be loaded into a leaf
    assert!(matches!(
        out.load_state_dict(&loaded),
        Err(Error::InvalidStateDict(_))
    ));
    Ok(())
}

#[test]
fn test_vector_file_roundtrip() -> w2v::Result<()> {
    let table = Matrix::<f32>::from_vec([3, 2], vec![0.1, 0.2, 1.1, 1.2, 2.1, 2.2])?;
    let mut vocab = Vocab::new();
    vocab.insert("king".to_string(), VocabEntry::new(1, 12));
    vocab.insert("queen".to_string(), VocabEntry::new(2, 9));
    vocab.insert("a".to_string(), VocabEntry::new(0, 300));

    let path = std::env::temp_dir().join("w2v_test_vectors.bin");
    vectors::save_vectors(&path, &table, &vocab)?;
    let bytes = std::fs::read(&path)?;
    let loaded = vectors::load_vectors(&path)?;
    std::fs::remove_file(&path)?;

    assert!(bytes.starts_with(b"3 2\na "));
    assert_eq!(bytes.len(), 4 + 3 * (2 * 4 + 2) + "a".len() + "king".len() + "queen".len());
    assert_eq!(loaded.words, vec!["a", "king", "queen"]);
    assert_eq!(loaded.get("queen"), Some(vec![2.1, 2.2]));
    assert_eq!(loaded.get("a"), Some(vec![0.1, 0.2]));
    Ok(())
}
