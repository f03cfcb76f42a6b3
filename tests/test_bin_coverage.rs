// Coverage tests for the helpers in the training binary.

#[allow(dead_code)]
mod train_classifier_bin {
    include!("../train_classifier.rs");

    #[cfg(test)]
    mod coverage_tests {
        use super::*;
        use seqnet::dataset::Dataset;

        #[test]
        fn test_default_architecture_builds_valid_network() {
            let spec = default_architecture().unwrap();
            let mut rng = SeededRng::new(1);
            let network = build_network(&spec, &mut rng).unwrap();
            assert!(network.is_valid());
            assert_eq!(network.inputs(), 2);
            assert_eq!(network.outputs(), 3);
        }

        #[test]
        fn test_blob_centres_shape_and_range() {
            let mut rng = SeededRng::new(2);
            let centres = blob_centres(4, 3, &mut rng);
            assert_eq!(centres.len(), 4);
            assert!(centres.iter().all(|c| c.len() == 3));
            assert!(centres.iter().flatten().all(|v| (-3.0..3.0).contains(v)));
        }

        #[test]
        fn test_blobs_cycle_through_classes() {
            let mut rng = SeededRng::new(3);
            let centres = vec![vec![0.0, 0.0], vec![10.0, 10.0]];
            let data = blobs(&centres, 6, 0.1, &mut rng).unwrap();

            assert_eq!(data.len(), 6);
            assert_eq!(data.classes(), 2);
            for i in 0..6 {
                assert_eq!(data.label(i), i % 2);
                let centre = &centres[i % 2];
                for (x, c) in data.features(i).iter().zip(centre) {
                    assert!((x - c).abs() < 1.0);
                }
            }
        }

        #[test]
        fn test_blobs_zero_noise_sits_on_centre() {
            let mut rng = SeededRng::new(4);
            let centres = vec![vec![1.5, -2.0]];
            let data = blobs(&centres, 3, 0.0, &mut rng).unwrap();
            for i in 0..3 {
                assert_eq!(data.features(i), &[1.5, -2.0]);
            }
        }

        #[test]
        fn test_default_setup_trains_single_worker() {
            let spec = default_architecture().unwrap();
            let mut rng = SeededRng::new(5);
            let centres = blob_centres(spec.outputs, spec.inputs, &mut rng);
            let train = blobs(&centres, 90, 0.3, &mut rng).unwrap();
            let network = build_network(&spec, &mut rng).unwrap();

            let config = TrainingConfig {
                epochs: 3,
                batch_size: 16,
                ..TrainingConfig::default()
            };
            let mut classifier =
                Classifier::new(network, seqnet::distributed::SingleProcess, rng).unwrap();
            let reports = classifier.fit(&train, None, &config, log_report).unwrap();
            assert_eq!(reports.len(), 4);
            assert!(reports.iter().all(|r| r.test_accuracy.is_none()));
        }
    }
}
