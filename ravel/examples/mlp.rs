use ravel::{CentralDifference, DescentConfig, Ravel};

// A dense layer, generic over its leaf type `P`.
#[derive(Ravel, Clone, Debug)]
struct Layer<P, const INPUTS: usize, const NEURONS: usize> {
    weights: [[P; INPUTS]; NEURONS],
    biases: [P; NEURONS],
}

impl<const INPUTS: usize, const NEURONS: usize> Layer<f64, INPUTS, NEURONS> {
    fn forward(&self, inputs: &[f64; INPUTS]) -> [f64; NEURONS] {
        std::array::from_fn(|i| {
            let dot: f64 = self.weights[i].iter().zip(inputs).map(|(w, x)| w * x).sum();
            dot + self.biases[i]
        })
    }
}

#[derive(Ravel, Clone, Debug)]
struct Mlp<P> {
    hidden: Layer<P, 1, 4>,
    output: Layer<P, 4, 1>,
}

impl Mlp<f64> {
    fn forward(&self, x: f64) -> f64 {
        let hidden = self.hidden.forward(&[x]).map(f64::tanh);
        let [y] = self.output.forward(&hidden);
        y
    }
}

fn main() -> ravel::Result<()> {
    // Samples of sin(x) on [-2, 2].
    let xs: Vec<f64> = (0..9).map(|i| -2.0 + 0.5 * i as f64).collect();
    let ys: Vec<f64> = xs.iter().map(|x| x.sin()).collect();

    let mut rng = fastrand::Rng::with_seed(7);
    let mut model = Mlp {
        hidden: Layer { weights: [[0.0; 1]; 4], biases: [0.0; 4] },
        output: Layer { weights: [[0.0; 4]; 1], biases: [0.0; 1] },
    };
    Ravel::visit_mut(&mut model, |w: &mut f64| *w = rng.f64() - 0.5);

    let mse = |m: &Mlp<f64>| {
        let total: f64 = xs.iter().zip(&ys).map(|(&x, &y)| (m.forward(x) - y).powi(2)).sum();
        total / xs.len() as f64
    };

    let (g, reinject, w0) = ravel::flatten_tree_function(mse, &model)?;
    println!("{} parameters, initial loss {:.5}", w0.len(), g.call(&w0)?);

    let config = DescentConfig { alpha: 0.2, max_its: 500 };
    let history = ravel::gradient_descent(|w| g.call(w), &CentralDifference::default(), w0, &config)?;

    if let Some((step, loss)) = history.best() {
        println!("best loss {loss:.5} after {step} steps");
        let trained = reinject.unflatten(&history.weights[step])?;
        for (x, y) in xs.iter().zip(&ys) {
            println!("x = {x:+.1}  sin(x) = {y:+.4}  mlp(x) = {:+.4}", trained.forward(*x));
        }

        // The gradient at the best point comes back shaped like the model.
        let grad = g.gradient(&CentralDifference::default(), &history.weights[step])?;
        println!("output bias gradient: {:+.2e}", grad.output.biases[0]);
    }
    Ok(())
}
