// Loading TOML configs from disk and building generators from them

#[cfg(test)]
mod tests {
    use std::io::Write;

    use otg_rs::config::{ConfigError, load_config};
    use otg_rs::{OutputParameter, UpdateResult};
    use tempfile::NamedTempFile;

    fn write_config(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    const POINT_TO_POINT: &str = r#"
        [generator]
        delta_time = 0.001
        calculation_budget_us = 1000000

        [limits]
        max_velocity = [2.0]
        max_acceleration = [2.0]
        max_jerk = [1.0]

        [motion]
        target_position = [1.0]
    "#;

    #[test]
    fn test_load_and_run() {
        let file = write_config(POINT_TO_POINT);
        let config = load_config(file.path().to_str().unwrap()).unwrap();
        assert_eq!(config.degrees_of_freedom(), 1);

        let mut otg = config.build_generator().unwrap();
        let mut input = config.input_parameter().unwrap();
        let mut output = OutputParameter::new(1);
        let mut result = UpdateResult::Working;
        for _ in 0..10_000 {
            result = otg.update(&input, &mut output);
            input.current_position.clone_from(&output.new_position);
            input.current_velocity.clone_from(&output.new_velocity);
            input.current_acceleration.clone_from(&output.new_acceleration);
            if result != UpdateResult::Working {
                break;
            }
        }
        assert_eq!(result, UpdateResult::Finished);
        assert_eq!(output.new_position, vec![1.0]);
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.toml");
        let err = load_config(missing.to_str().unwrap()).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }

    #[test]
    fn test_malformed_toml() {
        let file = write_config("[limits\nmax_velocity = [1.0]");
        let err = load_config(file.path().to_str().unwrap()).unwrap_err();
        assert!(matches!(err, ConfigError::Toml(_)));

        // [limits] is required
        let file = write_config("[generator]\ndelta_time = 0.01\n");
        let err = load_config(file.path().to_str().unwrap()).unwrap_err();
        assert!(matches!(err, ConfigError::Toml(_)));
    }

    #[test]
    fn test_invalid_values() {
        let file = write_config(
            r#"
            [generator]
            delta_time = 0.0

            [limits]
            max_velocity = [1.0]
            max_acceleration = [1.0]
            max_jerk = [1.0]
            "#,
        );
        let config = load_config(file.path().to_str().unwrap()).unwrap();
        assert!(matches!(config.build_generator(), Err(ConfigError::Invalid(_))));
        assert!(matches!(config.input_parameter(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_path_config() {
        let file = write_config(
            r#"
            [limits]
            max_velocity = [2.0, 2.0, 2.0]
            max_acceleration = [2.0, 2.0, 2.0]
            max_jerk = [1.0, 1.0, 1.0]

            [path]
            max_blend_distance = 0.1

            [[path.waypoints]]
            position = [1.0, 0.0, 0.0]

            [[path.waypoints]]
            position = [0.0, 1.0, -3.0]
            relative = true

            [[path.waypoints]]
            position = [0.0, 0.0, 0.0]
            "#,
        );
        let config = load_config(file.path().to_str().unwrap()).unwrap();
        let path = config.build_path().unwrap().unwrap();
        assert_eq!(path.waypoints().len(), 3);
        assert_eq!(path.q(path.length()), vec![0.0, 0.0, 0.0]);

        let input = config.input_parameter().unwrap();
        assert_eq!(input.path.as_ref(), Some(&path));
        let trajectory = config.build_generator().unwrap().calculate(&input).unwrap();
        assert!(trajectory.path().is_some());
        assert!(trajectory.duration() > 0.0);
    }

    #[test]
    fn test_degenerate_path_config() {
        let file = write_config(
            r#"
            [limits]
            max_velocity = [1.0, 1.0]
            max_acceleration = [1.0, 1.0]
            max_jerk = [1.0, 1.0]

            [[path.waypoints]]
            position = [0.0, 0.0]
            "#,
        );
        let config = load_config(file.path().to_str().unwrap()).unwrap();
        let path = config.build_path().unwrap().unwrap();
        assert_eq!(path.length(), 0.0);

        // a zero-length path cannot be followed
        let input = config.input_parameter().unwrap();
        let err = config.build_generator().unwrap().calculate(&input).unwrap_err();
        assert_eq!(err.code(), -102);
    }
}
