// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Battery-powered sensor drivers.
//!
//! Sensors are read-only. Each one pairs its primary service with a
//! [`BatteryMonitor`].

use crate::error::DeviceError;
use crate::state::{AccessoryRecord, CharacteristicValue, ClimateReading, StatePatch, StateSchema};

use super::{ServiceDescriptor, ServiceKind};

/// Battery sub-driver shared by all sensors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BatteryMonitor;

impl BatteryMonitor {
    fn service(name: &str) -> ServiceDescriptor {
        ServiceDescriptor::new(ServiceKind::Battery, format!("{name} Battery"))
    }

    /// Returns the battery level and low-battery flag of `record`.
    #[must_use]
    pub fn characteristics(record: &AccessoryRecord) -> [CharacteristicValue; 2] {
        let battery = record.battery();
        [
            CharacteristicValue::BatteryLevel(battery),
            CharacteristicValue::StatusLowBattery(battery.is_low()),
        ]
    }

    fn apply_remote_update(
        record: &AccessoryRecord,
        patch: &StatePatch,
        values: &mut Vec<CharacteristicValue>,
    ) {
        if patch.battery.is_some() {
            values.extend(Self::characteristics(record));
        }
    }
}

/// Driver for `CS` contact sensors.
///
/// A raw value of `1` means the contact is open (not detected); anything
/// else means closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ContactSensor;

impl ContactSensor {
    pub(super) fn services(name: &str) -> Vec<ServiceDescriptor> {
        vec![
            ServiceDescriptor::new(ServiceKind::ContactSensor, name),
            BatteryMonitor::service(name),
        ]
    }

    /// Returns `true` if contact is detected (the sensor is closed).
    ///
    /// # Errors
    ///
    /// Returns `DeviceError::StateShape` if the state is not a scalar.
    pub fn contact_detected(&self, record: &AccessoryRecord) -> Result<bool, DeviceError> {
        Ok(scalar(record)? != 1)
    }

    pub(super) fn characteristics(
        &self,
        record: &AccessoryRecord,
    ) -> Result<Vec<CharacteristicValue>, DeviceError> {
        let mut values = vec![CharacteristicValue::ContactDetected(
            self.contact_detected(record)?,
        )];
        values.extend(BatteryMonitor::characteristics(record));
        Ok(values)
    }

    pub(super) fn apply_remote_update(
        &self,
        record: &AccessoryRecord,
        patch: &StatePatch,
    ) -> Result<Vec<CharacteristicValue>, DeviceError> {
        let mut values = Vec::new();
        if patch.state.is_some() {
            let detected = self.contact_detected(record)?;
            tracing::debug!(device = %record.identity(), detected, "Contact sensor updated");
            values.push(CharacteristicValue::ContactDetected(detected));
        }
        BatteryMonitor::apply_remote_update(record, patch, &mut values);
        Ok(values)
    }
}

/// Driver for `MS` motion sensors. Motion is detected iff the raw value is
/// positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MotionSensor;

impl MotionSensor {
    pub(super) fn services(name: &str) -> Vec<ServiceDescriptor> {
        vec![
            ServiceDescriptor::new(ServiceKind::MotionSensor, name),
            BatteryMonitor::service(name),
        ]
    }

    /// Returns `true` if motion is detected.
    ///
    /// # Errors
    ///
    /// Returns `DeviceError::StateShape` if the state is not a scalar.
    pub fn motion_detected(&self, record: &AccessoryRecord) -> Result<bool, DeviceError> {
        Ok(scalar(record)? > 0)
    }

    pub(super) fn characteristics(
        &self,
        record: &AccessoryRecord,
    ) -> Result<Vec<CharacteristicValue>, DeviceError> {
        let mut values = vec![CharacteristicValue::MotionDetected(
            self.motion_detected(record)?,
        )];
        values.extend(BatteryMonitor::characteristics(record));
        Ok(values)
    }

    pub(super) fn apply_remote_update(
        &self,
        record: &AccessoryRecord,
        patch: &StatePatch,
    ) -> Result<Vec<CharacteristicValue>, DeviceError> {
        let mut values = Vec::new();
        if patch.state.is_some() {
            let detected = self.motion_detected(record)?;
            tracing::debug!(device = %record.identity(), detected, "Motion sensor updated");
            values.push(CharacteristicValue::MotionDetected(detected));
        }
        BatteryMonitor::apply_remote_update(record, patch, &mut values);
        Ok(values)
    }
}

/// Driver for `TS` temperature and humidity sensors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TemperatureHumidity;

impl TemperatureHumidity {
    pub(super) fn services(name: &str) -> Vec<ServiceDescriptor> {
        vec![
            ServiceDescriptor::new(ServiceKind::TemperatureSensor, name),
            ServiceDescriptor::new(ServiceKind::HumiditySensor, format!("{name} Humidity")),
            BatteryMonitor::service(name),
        ]
    }

    /// Returns the current reading.
    ///
    /// # Errors
    ///
    /// Returns `DeviceError::StateShape` if the state is not a climate
    /// reading.
    pub fn reading(&self, record: &AccessoryRecord) -> Result<ClimateReading, DeviceError> {
        record
            .state()
            .as_climate()
            .copied()
            .ok_or(DeviceError::StateShape {
                expected: StateSchema::Climate.name(),
            })
    }

    pub(super) fn characteristics(
        &self,
        record: &AccessoryRecord,
    ) -> Result<Vec<CharacteristicValue>, DeviceError> {
        let reading = self.reading(record)?;
        let mut values = vec![
            CharacteristicValue::CurrentTemperature(reading.temperature),
            CharacteristicValue::CurrentRelativeHumidity(reading.relative_humidity),
        ];
        values.extend(BatteryMonitor::characteristics(record));
        Ok(values)
    }

    pub(super) fn apply_remote_update(
        &self,
        record: &AccessoryRecord,
        patch: &StatePatch,
    ) -> Result<Vec<CharacteristicValue>, DeviceError> {
        let mut values = Vec::new();
        if patch.state.is_some() {
            let reading = self.reading(record)?;
            tracing::debug!(
                device = %record.identity(),
                temperature = reading.temperature,
                humidity = reading.relative_humidity,
                "Temperature sensor updated"
            );
            values.push(CharacteristicValue::CurrentTemperature(reading.temperature));
            values.push(CharacteristicValue::CurrentRelativeHumidity(
                reading.relative_humidity,
            ));
        }
        BatteryMonitor::apply_remote_update(record, patch, &mut values);
        Ok(values)
    }
}

fn scalar(record: &AccessoryRecord) -> Result<i64, DeviceError> {
    record.state().as_scalar().ok_or(DeviceError::StateShape {
        expected: StateSchema::Scalar.name(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::DeviceIdentity;
    use crate::types::CapabilityType;
    use serde_json::{Value, json};

    fn sensor(kind: CapabilityType, state: Value, battery: Value) -> AccessoryRecord {
        AccessoryRecord::from_wire(
            DeviceIdentity::new("s1", kind),
            "Porch",
            Some(&state),
            Some(&battery),
        )
        .unwrap()
    }

    #[test]
    fn contact_polarity() {
        let open = sensor(CapabilityType::ContactSensor, json!(1), Value::Null);
        assert!(!ContactSensor.contact_detected(&open).unwrap());

        let closed = sensor(CapabilityType::ContactSensor, json!(0), Value::Null);
        assert!(ContactSensor.contact_detected(&closed).unwrap());

        let other = sensor(CapabilityType::ContactSensor, json!(2), Value::Null);
        assert!(ContactSensor.contact_detected(&other).unwrap());
    }

    #[test]
    fn motion_threshold() {
        let idle = sensor(CapabilityType::MotionSensor, json!(0), Value::Null);
        assert!(!MotionSensor.motion_detected(&idle).unwrap());

        let moving = sensor(CapabilityType::MotionSensor, json!(3), Value::Null);
        assert!(MotionSensor.motion_detected(&moving).unwrap());
    }

    #[test]
    fn battery_threshold() {
        let low = sensor(CapabilityType::MotionSensor, json!(0), json!(19));
        assert_eq!(
            BatteryMonitor::characteristics(&low)[1],
            CharacteristicValue::StatusLowBattery(true)
        );

        let normal = sensor(CapabilityType::MotionSensor, json!(0), json!(20));
        assert_eq!(
            BatteryMonitor::characteristics(&normal)[1],
            CharacteristicValue::StatusLowBattery(false)
        );
    }

    #[test]
    fn battery_only_update() {
        let mut record = sensor(CapabilityType::ContactSensor, json!(1), json!(90));
        let patch = StatePatch::from_wire(None, Some(&json!(10))).unwrap();
        record.apply_patch(&patch).unwrap();

        let values = ContactSensor.apply_remote_update(&record, &patch).unwrap();
        assert_eq!(values.len(), 2);
        assert_eq!(values[1], CharacteristicValue::StatusLowBattery(true));
    }

    #[test]
    fn climate_values() {
        let record = sensor(
            CapabilityType::TemperatureSensor,
            json!({"t": "22.5", "rh": 48}),
            json!(70),
        );
        let values = TemperatureHumidity.characteristics(&record).unwrap();
        assert_eq!(values[0], CharacteristicValue::CurrentTemperature(22.5));
        assert_eq!(values[1], CharacteristicValue::CurrentRelativeHumidity(48.0));
        assert_eq!(values.len(), 4);
    }

    #[test]
    fn climate_services() {
        let names: Vec<_> = TemperatureHumidity::services("Attic")
            .into_iter()
            .map(|s| s.name)
            .collect();
        assert_eq!(names, ["Attic", "Attic Humidity", "Attic Battery"]);
    }
}
